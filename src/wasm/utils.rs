//! WASM utility functions

use wasm_bindgen::prelude::*;

/// Route Rust panics to the browser console
#[wasm_bindgen(js_name = initPanicHook)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}
