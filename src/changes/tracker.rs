//! ChangeTracker: the track-changes ledger for one open file
//!
//! Each local edit is logged as a pending `FileChange`. A pending change is
//! resolved exactly once: accepted (kept as immutable history) or rejected
//! (its inverse is applied and the entry disappears).
//!
//! Pending changes carry their inverse expressed against the *current*
//! text. Every later edit, local or remote, rebases them, so rejecting an old
//! change removes exactly the text it introduced even after the document moved
//! around it.

use crate::editor::{transform_pair, transform_position, AppliedEdit, Operation, OperationKind, Tie};
use crate::error::{EditorError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Change identifier
pub type ChangeId = Uuid;

/// Kind of tracked change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Insert,
    Delete,
    Replace,
    Format,
    /// Whole-document restore of an earlier version
    Restore,
}

impl From<OperationKind> for ChangeType {
    fn from(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Insert => ChangeType::Insert,
            OperationKind::Delete => ChangeType::Delete,
            OperationKind::Replace => ChangeType::Replace,
            OperationKind::Format => ChangeType::Format,
        }
    }
}

/// A tracked edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    pub id: ChangeId,
    pub change_type: ChangeType,
    /// Char position of the change in the current text
    pub position: usize,
    /// Text written by the change
    pub content: String,
    /// Text the change removed (delete/replace/restore)
    pub original_content: Option<String>,
    pub user: String,
    pub timestamp: DateTime<Utc>,
    pub accepted: bool,
    /// Operations that revert the change on the current text
    #[serde(skip)]
    inverse: Vec<Operation>,
}

impl FileChange {
    pub fn inverse(&self) -> &[Operation] {
        &self.inverse
    }
}

/// Pending/accepted change ledger
#[derive(Debug, Clone, Default)]
pub struct ChangeTracker {
    /// Pending changes in insertion order
    pending: Vec<FileChange>,
    accepted: Vec<FileChange>,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log an applied local edit as a pending change
    pub fn record(
        &mut self,
        id: ChangeId,
        change_type: ChangeType,
        edit: &AppliedEdit,
        user: &str,
    ) -> &FileChange {
        let position = edit
            .forward
            .iter()
            .map(|op| op.range().start)
            .min()
            .unwrap_or(0);
        let content: String = edit.forward.iter().filter_map(|op| op.text()).collect();
        let removed = edit.removed_text();
        let original_content = match change_type {
            ChangeType::Delete | ChangeType::Replace | ChangeType::Restore => Some(removed),
            _ if !removed.is_empty() => Some(removed),
            _ => None,
        };

        self.pending.push(FileChange {
            id,
            change_type,
            position,
            content,
            original_content,
            user: user.to_string(),
            timestamp: Utc::now(),
            accepted: false,
            inverse: edit.inverse.clone(),
        });
        &self.pending[self.pending.len() - 1]
    }

    /// Rebase all pending changes over operations just applied to the text
    pub fn rebase(&mut self, applied: &[Operation]) {
        for change in &mut self.pending {
            let (inverse, _) = transform_pair(&change.inverse, applied, Tie::Right);
            change.inverse = inverse;
            change.position = applied
                .iter()
                .fold(change.position, |pos, op| transform_position(pos, op));
        }
    }

    /// Mark a pending change as accepted
    ///
    /// # Errors
    ///
    /// `EditorError::ChangeNotFound` if the id is not pending (unknown,
    /// already accepted, or rejected). The ledger is unchanged.
    pub fn accept(&mut self, id: ChangeId) -> Result<&FileChange> {
        let index = self.pending_index(id)?;
        let mut change = self.pending.remove(index);
        change.accepted = true;
        change.inverse.clear();
        tracing::debug!(change = %id, "change accepted");
        self.accepted.push(change);
        Ok(&self.accepted[self.accepted.len() - 1])
    }

    /// Reject a pending change, reverting it through `revert`
    ///
    /// `revert` receives the change's inverse and must apply it to the text.
    /// The entry is removed only if `revert` succeeds.
    pub fn reject_with<T>(
        &mut self,
        id: ChangeId,
        revert: impl FnOnce(&[Operation]) -> Result<T>,
    ) -> Result<(FileChange, T)> {
        let index = self.pending_index(id)?;
        let outcome = revert(&self.pending[index].inverse)?;
        let change = self.pending.remove(index);
        tracing::debug!(change = %id, "change rejected");
        Ok((change, outcome))
    }

    /// Accept every pending change, oldest first
    pub fn accept_all(&mut self) -> usize {
        let count = self.pending.len();
        for mut change in self.pending.drain(..) {
            change.accepted = true;
            change.inverse.clear();
            self.accepted.push(change);
        }
        count
    }

    /// Forget all pending changes (after a full resync)
    pub fn clear_pending(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_accepted(&self, id: ChangeId) -> bool {
        self.accepted.iter().any(|c| c.id == id)
    }

    pub fn is_pending(&self, id: ChangeId) -> bool {
        self.pending.iter().any(|c| c.id == id)
    }

    pub fn get(&self, id: ChangeId) -> Option<&FileChange> {
        self.pending
            .iter()
            .chain(self.accepted.iter())
            .find(|c| c.id == id)
    }

    /// Pending changes in insertion order
    pub fn pending(&self) -> &[FileChange] {
        &self.pending
    }

    /// Accepted changes in acceptance order
    pub fn accepted(&self) -> &[FileChange] {
        &self.accepted
    }

    fn pending_index(&self, id: ChangeId) -> Result<usize> {
        self.pending.iter().position(|c| c.id == id).ok_or_else(|| {
            tracing::warn!(change = %id, "stale change id");
            EditorError::ChangeNotFound(id.to_string())
        })
    }
}
