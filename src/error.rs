//! Error types for the editing core
//!
//! Every failure in the core is recoverable: the document stays open and
//! editable whatever variant is returned.

use thiserror::Error;

/// Result type for editing-core operations
pub type Result<T> = std::result::Result<T, EditorError>;

/// Errors that can occur in the editing core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditorError {
    /// Out-of-range or malformed operation, rejected before any mutation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Accept/reject referencing a change that is no longer pending
    #[error("change not found: {0}")]
    ChangeNotFound(String),

    /// Version id unknown to the version log and the store
    #[error("version not found: {0}")]
    VersionNotFound(String),

    /// Mutation attempted while the editor is read-only
    #[error("editor is read-only")]
    ReadOnly,

    /// Persistence backend rejected or failed a request
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A network call did not complete in time
    #[error("timed out after {0} ms")]
    Timeout(u64),

    /// Remote operation could not be reconciled with local state
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    /// Server no longer holds the operations after the requested sequence number
    #[error("operation history truncated: requested since {requested}, oldest available {oldest}")]
    HistoryTruncated { requested: u64, oldest: u64 },

    /// Collaboration call made while not joined to a session
    #[error("not collaborating on this file")]
    NotCollaborating,

    /// Autosave gave up after exhausting its retries
    #[error("autosave failed after {attempts} attempts: {last_error}")]
    AutoSaveExhausted { attempts: u32, last_error: String },

    /// JSON encoding/decoding error
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl EditorError {
    /// Whether the autosave retry policy applies to this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, EditorError::Persistence(_) | EditorError::Timeout(_))
    }
}

impl From<serde_json::Error> for EditorError {
    fn from(e: serde_json::Error) -> Self {
        EditorError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(EditorError::Persistence("503".into()).is_retryable());
        assert!(EditorError::Timeout(5_000).is_retryable());
        assert!(!EditorError::ReadOnly.is_retryable());
        assert!(!EditorError::ChangeNotFound("c1".into()).is_retryable());
    }

    #[test]
    fn test_display() {
        let err = EditorError::HistoryTruncated {
            requested: 3,
            oldest: 10,
        };
        assert_eq!(
            err.to_string(),
            "operation history truncated: requested since 3, oldest available 10"
        );
    }
}
