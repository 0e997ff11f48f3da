//! EditorStateManager: document content plus undo/redo history
//!
//! Every local mutation goes through this type. It validates the request,
//! applies it, and pushes the exact inverse on the undo stack. Undo and redo
//! move entries between the two stacks, recomputing the opposite form each
//! time, so the stacks always describe the current text.
//!
//! # Example
//!
//! ```rust
//! use coedit_core::editor::EditorStateManager;
//!
//! let mut editor = EditorStateManager::new("");
//! editor.insert_text(0, "Hello").unwrap();
//! assert_eq!(editor.content(), "Hello");
//!
//! editor.undo().unwrap();
//! assert_eq!(editor.content(), "");
//!
//! editor.redo().unwrap();
//! assert_eq!(editor.content(), "Hello");
//! ```

use super::format::{CharStyle, FormatAttribute, Formatting};
use super::operation::{apply_all, Operation};
use super::text::DocumentText;
use super::transform::{transform_pair, Tie};
use crate::error::{EditorError, Result};
use chrono::{DateTime, Utc};
use std::ops::Range;
use uuid::Uuid;

/// One undo or redo step
///
/// A step is usually one operation; steps rebased over remote edits may
/// split into several, applied in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub ops: Vec<Operation>,
    /// Tracked change this step belongs to, if any
    pub change_id: Option<Uuid>,
}

/// Result of a successful mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEdit {
    /// Operations as applied, in order
    pub forward: Vec<Operation>,
    /// Operations that undo `forward`, in order
    pub inverse: Vec<Operation>,
    /// Revision after the edit
    pub revision: u64,
}

/// Result of an undo or redo step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStep {
    pub edit: AppliedEdit,
    pub change_id: Option<Uuid>,
}

impl AppliedEdit {
    /// Text removed by the edit, in document order
    pub fn removed_text(&self) -> String {
        self.inverse
            .iter()
            .filter_map(|op| op.text())
            .collect::<Vec<_>>()
            .concat()
    }
}

/// Owned editor state with explicit transition methods
#[derive(Debug, Clone)]
pub struct EditorStateManager {
    text: DocumentText,
    /// Id of the version snapshot the content derives from
    version: Option<String>,
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    last_saved: Option<DateTime<Utc>>,
    has_unsaved_changes: bool,
    revision: u64,
    /// Maximum undo depth (0 = unbounded)
    undo_limit: usize,
    read_only: bool,
}

impl EditorStateManager {
    /// Create a manager over unformatted initial content
    pub fn new(content: &str) -> Self {
        Self {
            text: DocumentText::from_text(content),
            version: None,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            last_saved: None,
            has_unsaved_changes: false,
            revision: 0,
            undo_limit: 0,
            read_only: false,
        }
    }

    pub fn with_undo_limit(mut self, limit: usize) -> Self {
        self.undo_limit = limit;
        self
    }

    pub fn content(&self) -> String {
        self.text.to_string()
    }

    pub fn text(&self) -> &DocumentText {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn styles(&self) -> &[CharStyle] {
        self.text.all_styles()
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn set_version(&mut self, version: Option<String>) {
        self.version = version;
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.has_unsaved_changes
    }

    /// Monotonic counter bumped by every mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn undo_stack(&self) -> &[HistoryEntry] {
        &self.undo_stack
    }

    pub fn redo_stack(&self) -> &[HistoryEntry] {
        &self.redo_stack
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn insert_text(&mut self, position: usize, text: &str) -> Result<AppliedEdit> {
        self.apply(Operation::insert(position, text))
    }

    pub fn delete_text(&mut self, range: Range<usize>) -> Result<AppliedEdit> {
        self.apply(Operation::delete(range))
    }

    pub fn replace_text(&mut self, range: Range<usize>, text: &str) -> Result<AppliedEdit> {
        self.apply(Operation::replace(range, text))
    }

    pub fn apply_formatting(
        &mut self,
        range: Range<usize>,
        formatting: Formatting,
    ) -> Result<AppliedEdit> {
        self.apply(Operation::format(range, formatting))
    }

    /// Toggle an attribute over the selection (Ctrl+B/I/U semantics)
    pub fn toggle_formatting(
        &mut self,
        range: Range<usize>,
        attribute: FormatAttribute,
    ) -> Result<AppliedEdit> {
        let formatting = self.toggled(range.clone(), attribute)?;
        self.apply_formatting(range, formatting)
    }

    /// Formatting a toggle over `range` would apply
    pub fn toggled(&self, range: Range<usize>, attribute: FormatAttribute) -> Result<Formatting> {
        if range.start > range.end || range.end > self.len() {
            return Err(EditorError::InvalidOperation(format!(
                "selection {}..{} out of bounds (length: {})",
                range.start,
                range.end,
                self.len()
            )));
        }
        Ok(Formatting::toggle(attribute, &self.text.styles(range)))
    }

    /// Apply a local operation and record its inverse
    pub fn apply(&mut self, op: Operation) -> Result<AppliedEdit> {
        self.apply_tracked(vec![op], None)
    }

    /// Apply local operations as one undo step tagged with a tracked change
    pub fn apply_tracked(
        &mut self,
        ops: Vec<Operation>,
        change_id: Option<Uuid>,
    ) -> Result<AppliedEdit> {
        self.ensure_writable()?;
        let edit = self.mutate(ops)?;
        self.redo_stack.clear();
        self.push_undo(HistoryEntry {
            ops: edit.inverse.clone(),
            change_id,
        });
        Ok(edit)
    }

    /// Replace the whole document as one undoable step (version restore)
    pub fn restore(&mut self, content: &str, change_id: Option<Uuid>) -> Result<AppliedEdit> {
        let op = Operation::replace(0..self.len(), content);
        self.apply_tracked(vec![op], change_id)
    }

    /// Undo the most recent step; `None` when there is nothing to undo
    ///
    /// The step keeps the change id of the edit it belongs to, on the redo
    /// stack and back.
    pub fn undo(&mut self) -> Result<Option<HistoryStep>> {
        self.ensure_writable()?;
        let Some(entry) = self.undo_stack.pop() else {
            return Ok(None);
        };

        let edit = match self.mutate(entry.ops.clone()) {
            Ok(edit) => edit,
            Err(e) => {
                self.undo_stack.push(entry);
                return Err(e);
            }
        };

        self.redo_stack.push(HistoryEntry {
            ops: edit.inverse.clone(),
            change_id: entry.change_id,
        });
        Ok(Some(HistoryStep {
            edit,
            change_id: entry.change_id,
        }))
    }

    /// Redo the most recently undone step; `None` when there is nothing to redo
    pub fn redo(&mut self) -> Result<Option<HistoryStep>> {
        self.ensure_writable()?;
        let Some(entry) = self.redo_stack.pop() else {
            return Ok(None);
        };

        let edit = match self.mutate(entry.ops.clone()) {
            Ok(edit) => edit,
            Err(e) => {
                self.redo_stack.push(entry);
                return Err(e);
            }
        };

        self.push_undo(HistoryEntry {
            ops: edit.inverse.clone(),
            change_id: entry.change_id,
        });
        Ok(Some(HistoryStep {
            edit,
            change_id: entry.change_id,
        }))
    }

    /// Apply an already-transformed remote operation
    ///
    /// Remote edits are not undoable locally. Both history stacks are rebased
    /// over them so local undo keeps targeting the same text.
    pub fn apply_remote(&mut self, ops: &[Operation]) -> Result<AppliedEdit> {
        let edit = self.mutate(ops.to_vec())?;
        Self::rebase_stack(&mut self.undo_stack, &edit.forward);
        Self::rebase_stack(&mut self.redo_stack, &edit.forward);
        Ok(edit)
    }

    /// Replace content wholesale after a resync; history is discarded
    pub fn reset(&mut self, content: &str, version: Option<String>) {
        self.text = DocumentText::from_text(content);
        self.version = version;
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.revision += 1;
        self.has_unsaved_changes = false;
    }

    /// Record a successful save of the content as of `revision`
    ///
    /// Edits made while the save was in flight keep the document dirty.
    pub fn mark_saved(&mut self, revision: u64, at: DateTime<Utc>, version: Option<String>) {
        self.last_saved = Some(at);
        if version.is_some() {
            self.version = version;
        }
        if revision == self.revision {
            self.has_unsaved_changes = false;
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            Err(EditorError::ReadOnly)
        } else {
            Ok(())
        }
    }

    fn mutate(&mut self, ops: Vec<Operation>) -> Result<AppliedEdit> {
        let inverse = apply_all(&ops, &mut self.text)?;
        self.revision += 1;
        self.has_unsaved_changes = true;
        Ok(AppliedEdit {
            forward: ops,
            inverse,
            revision: self.revision,
        })
    }

    fn push_undo(&mut self, entry: HistoryEntry) {
        self.undo_stack.push(entry);
        if self.undo_limit > 0 && self.undo_stack.len() > self.undo_limit {
            let excess = self.undo_stack.len() - self.undo_limit;
            self.undo_stack.drain(..excess);
        }
    }

    /// Rebase a history stack over `applied`, which ran on the current text
    ///
    /// The top entry is defined on the current text; each entry below it is
    /// defined on the text after the entries above it were applied, so the
    /// remote edit is carried down the stack as it goes.
    fn rebase_stack(stack: &mut Vec<HistoryEntry>, applied: &[Operation]) {
        let mut carried = applied.to_vec();
        for entry in stack.iter_mut().rev() {
            let (ops, rest) = transform_pair(&entry.ops, &carried, Tie::Left);
            entry.ops = ops;
            carried = rest;
        }
        stack.retain(|entry| !entry.ops.is_empty());
    }
}

impl Default for EditorStateManager {
    fn default() -> Self {
        Self::new("")
    }
}
