//! Track changes
//!
//! The pending-change ledger that lets edits be reviewed before they are
//! committed (accepted) or reverted (rejected).

pub mod tracker;

pub use tracker::{ChangeId, ChangeTracker, ChangeType, FileChange};
