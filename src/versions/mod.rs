//! Version snapshots
//!
//! Immutable, numbered captures of full document content. Restoring an old
//! version is a forward write through the editor, never a rollback of the log.

pub mod diff;
pub mod manager;

pub use diff::{DiffStats, LineChange, LineModification, VersionComparison};
pub use manager::{FileVersion, VersionDraft, VersionManager};
