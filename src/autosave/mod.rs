//! Periodic persistence
pub mod scheduler;

pub use scheduler::{AutoSaveEvent, AutoSaveScheduler, SaveTarget};
