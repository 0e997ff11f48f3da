//! WASM bindings
//!
//! Exposes the local editing surface to the browser UI.

#[cfg(feature = "wasm")]
pub mod bindings;

#[cfg(feature = "wasm")]
pub mod utils;

#[cfg(feature = "wasm")]
pub use bindings::WasmEditor;
