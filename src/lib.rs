//! Coedit Core - collaborative document-editing engine
//!
//! The editing core of a browser word processor, compiled to both native
//! and WASM. It implements:
//! - Character-addressed document text with per-character formatting
//! - Undo/redo over invertible operations
//! - Track changes with accept/reject
//! - Monotonic version history with line diffs and tags
//! - Real-time collaboration over a sequenced operation log
//! - Autosave with bounded retries
//!
//! # Examples
//!
//! ```rust
//! use coedit_core::{DocumentCore, EditorConfig};
//!
//! let mut doc = DocumentCore::new("file-1", "Hello", &EditorConfig::for_user("alice"));
//! doc.insert_text(5, " world").unwrap();
//! assert_eq!(doc.content(), "Hello world");
//!
//! doc.undo().unwrap();
//! assert_eq!(doc.content(), "Hello");
//! ```

pub mod autosave;
pub mod backend;
pub mod changes;
pub mod collab;
pub mod config;
pub mod document;
pub mod editor;
pub mod error;
pub mod versions;

#[cfg(feature = "wasm")]
pub mod wasm;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use autosave::{AutoSaveEvent, AutoSaveScheduler};
pub use backend::{CollabServer, VersionStore};
pub use changes::{ChangeId, ChangeTracker, ChangeType, FileChange};
pub use collab::{ClientMessage, CollaborationCoordinator, Sequencer, ServerMessage, SyncState};
pub use config::EditorConfig;
pub use document::{DocumentCore, OpenDocument};
pub use editor::{EditorStateManager, Operation};
pub use error::{EditorError, Result};
pub use versions::{FileVersion, VersionManager};
