//! Real-time collaboration
//!
//! A central sequencer totally orders operations; each client keeps one
//! operation in flight and transforms incoming operations against its
//! unacknowledged local work. Cursor presence rides alongside as
//! last-writer-wins updates and never affects content.

mod clock;
pub mod coordinator;
pub mod messages;
pub mod sequencer;
pub mod session;

pub use clock::CursorClock;
pub use coordinator::{CollaborationCoordinator, Reception, RemoteEdit, SyncState};
pub use messages::{ClientMessage, CursorUpdate, OperationMessage, SequencedOperation, ServerMessage};
pub use sequencer::Sequencer;
pub use session::{CollaborativeSession, Participant};
