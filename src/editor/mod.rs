//! Local editing model
//!
//! - **Operations:** insert/delete/replace/format with exact inverses
//! - **Transform:** rebasing of concurrent operations (OT)
//! - **State:** `EditorStateManager` owning content and undo/redo stacks
//! - **Keymap:** keyboard chords mapped to editor commands

pub mod format;
pub mod keymap;
pub mod operation;
pub mod state;
pub mod text;
pub mod transform;

pub use format::{Alignment, CharStyle, FormatAttribute, FormatChange, Formatting};
pub use keymap::{EditorCommand, KeyChord};
pub use operation::{apply_all, Operation, OperationKind};
pub use state::{AppliedEdit, EditorStateManager, HistoryEntry, HistoryStep};
pub use text::DocumentText;
pub use transform::{transform, transform_pair, transform_position, Tie};
