//! An open file: every editing component behind one ordering lock
//!
//! [`DocumentCore`] is the synchronous heart. It is the only place that
//! calls more than one component, so a local edit, its change record, its
//! collaboration message, and the rebasing of everything pending happen as
//! one step. [`OpenDocument`] wraps it for async hosts: the core sits behind
//! a `parking_lot::Mutex` that is never held across an `.await`, saves are
//! serialized by a separate async lock, and outbound collaboration messages
//! go to an unbounded channel the transport drains.
//!
//! # Example
//!
//! ```rust
//! use coedit_core::{DocumentCore, EditorConfig};
//!
//! let mut doc = DocumentCore::new("file-1", "", &EditorConfig::for_user("alice"));
//! let id = doc.insert_text(0, "Hello").unwrap();
//! assert_eq!(doc.changes().pending().len(), 1);
//!
//! doc.accept_change(id).unwrap();
//! assert!(doc.accept_change(id).is_err());
//! assert_eq!(doc.content(), "Hello");
//! ```

use crate::autosave::{AutoSaveEvent, AutoSaveScheduler, SaveTarget};
use crate::backend::{
    BackupDescriptor, BackupRequest, CheckIn, CheckInReceipt, CollabServer, ServerSnapshot,
    VersionStore,
};
use crate::changes::{ChangeId, ChangeTracker, ChangeType, FileChange};
use crate::collab::{
    ClientMessage, CollaborationCoordinator, Reception, SequencedOperation, ServerMessage,
    SyncState,
};
use crate::config::EditorConfig;
use crate::editor::{
    AppliedEdit, EditorCommand, EditorStateManager, FormatAttribute, Formatting, HistoryStep,
    KeyChord, Operation,
};
use crate::error::{EditorError, Result};
use crate::versions::{FileVersion, VersionComparison, VersionDraft, VersionManager};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::future::Future;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// Comment on the version saved before a degraded session is resynced
pub const RESYNC_COMMENT: &str = "Local copy before resync";

const AUTOSAVE_COMMENT: &str = "Autosave";

/// A version snapshot taken under the edit lock, not yet persisted
#[derive(Debug, Clone)]
pub struct PreparedSave {
    pub draft: VersionDraft,
    /// Editor revision the snapshot was taken at
    pub revision: u64,
}

impl PreparedSave {
    pub fn check_in(&self) -> CheckIn {
        CheckIn {
            version_number: self.draft.version_number,
            comment: self.draft.comment.clone(),
            is_minor_version: self.draft.is_minor_version,
            content: self.draft.content.clone(),
            created_by: self.draft.created_by.clone(),
        }
    }
}

#[derive(Debug)]
pub struct DocumentCore {
    file_id: String,
    user: String,
    editor: EditorStateManager,
    changes: ChangeTracker,
    versions: VersionManager,
    collab: CollaborationCoordinator,
    outbox: Vec<ClientMessage>,
}

impl DocumentCore {
    pub fn new(file_id: impl Into<String>, content: &str, config: &EditorConfig) -> Self {
        let file_id = file_id.into();
        let mut editor = EditorStateManager::new(content).with_undo_limit(config.undo_limit);
        editor.set_read_only(config.read_only);

        Self {
            collab: CollaborationCoordinator::new(
                file_id.clone(),
                config.user.clone(),
                &config.collaboration,
            ),
            versions: VersionManager::new(file_id.clone()),
            changes: ChangeTracker::new(),
            editor,
            user: config.user.clone(),
            outbox: Vec::new(),
            file_id,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn content(&self) -> String {
        self.editor.content()
    }

    pub fn editor(&self) -> &EditorStateManager {
        &self.editor
    }

    pub fn changes(&self) -> &ChangeTracker {
        &self.changes
    }

    pub fn versions(&self) -> &VersionManager {
        &self.versions
    }

    pub fn collab(&self) -> &CollaborationCoordinator {
        &self.collab
    }

    /// Messages produced for the collaboration transport since the last call
    pub fn take_outbound(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbox)
    }

    pub fn insert_text(&mut self, position: usize, text: &str) -> Result<ChangeId> {
        self.edit(Operation::insert(position, text))
    }

    pub fn delete_text(&mut self, range: Range<usize>) -> Result<ChangeId> {
        self.edit(Operation::delete(range))
    }

    pub fn replace_text(&mut self, range: Range<usize>, text: &str) -> Result<ChangeId> {
        self.edit(Operation::replace(range, text))
    }

    pub fn apply_formatting(&mut self, range: Range<usize>, formatting: Formatting) -> Result<ChangeId> {
        self.edit(Operation::format(range, formatting))
    }

    pub fn toggle_formatting(&mut self, range: Range<usize>, attribute: FormatAttribute) -> Result<ChangeId> {
        let formatting = self.editor.toggled(range.clone(), attribute)?;
        self.apply_formatting(range, formatting)
    }

    /// Apply a local operation as one undo step and one pending change
    pub fn edit(&mut self, op: Operation) -> Result<ChangeId> {
        let change_type = ChangeType::from(op.kind());
        let id = Uuid::new_v4();
        let edit = self.editor.apply_tracked(vec![op], Some(id))?;
        self.propagate(&edit);
        self.changes.record(id, change_type, &edit, &self.user);
        Ok(id)
    }

    /// Undo the last step; returns false when there was nothing to undo
    ///
    /// Unless the step belongs to an accepted change, the undo is itself
    /// tracked as a new pending change.
    pub fn undo(&mut self) -> Result<bool> {
        let Some(step) = self.editor.undo()? else {
            return Ok(false);
        };
        self.propagate(&step.edit);
        self.track_step(&step);
        Ok(true)
    }

    /// Redo the last undone step, tracked like [`DocumentCore::undo`]
    pub fn redo(&mut self) -> Result<bool> {
        let Some(step) = self.editor.redo()? else {
            return Ok(false);
        };
        self.propagate(&step.edit);
        self.track_step(&step);
        Ok(true)
    }

    pub fn accept_change(&mut self, id: ChangeId) -> Result<FileChange> {
        self.ensure_writable()?;
        self.changes.accept(id).cloned()
    }

    /// Revert a pending change as a new, undoable edit
    pub fn reject_change(&mut self, id: ChangeId) -> Result<FileChange> {
        let editor = &mut self.editor;
        let (change, edit) = self.changes.reject_with(id, |inverse| {
            if inverse.is_empty() {
                return if editor.is_read_only() {
                    Err(EditorError::ReadOnly)
                } else {
                    Ok(None)
                };
            }
            editor.apply_tracked(inverse.to_vec(), None).map(Some)
        })?;

        if let Some(edit) = edit {
            self.propagate(&edit);
        }
        Ok(change)
    }

    pub fn accept_all(&mut self) -> Result<usize> {
        self.ensure_writable()?;
        Ok(self.changes.accept_all())
    }

    /// Reject every pending change, newest first
    pub fn reject_all(&mut self) -> Result<usize> {
        let ids: Vec<ChangeId> = self.changes.pending().iter().rev().map(|c| c.id).collect();
        for id in &ids {
            self.reject_change(*id)?;
        }
        Ok(ids.len())
    }

    /// Run a keyboard command against `selection`
    ///
    /// `Save` does nothing here; persistence is async and handled by
    /// [`OpenDocument::handle_key`].
    pub fn execute(&mut self, command: EditorCommand, selection: Range<usize>) -> Result<()> {
        match command {
            EditorCommand::Save => {}
            EditorCommand::Undo => {
                self.undo()?;
            }
            EditorCommand::Redo => {
                self.redo()?;
            }
            EditorCommand::ToggleFormat(attribute) => {
                self.toggle_formatting(selection, attribute)?;
            }
        }
        Ok(())
    }

    /// Replace the content with a version's, as one tracked undoable change
    pub fn restore_version(&mut self, version_id: &str, content: &str) -> Result<ChangeId> {
        let id = Uuid::new_v4();
        let edit = self.editor.restore(content, Some(id))?;
        self.propagate(&edit);
        self.changes.record(id, ChangeType::Restore, &edit, &self.user);
        self.editor.set_version(Some(version_id.to_string()));
        tracing::info!(file = %self.file_id, version = version_id, "version restored");
        Ok(id)
    }

    pub fn cache_version_content(&mut self, version_id: &str, content: String) {
        self.versions.cache_snapshot(version_id, content);
    }

    pub fn tag_version(&mut self, version_id: &str, tag: &str) -> Result<FileVersion> {
        self.versions.add_tag(version_id, tag).cloned()
    }

    pub fn merge_versions(&mut self, listing: Vec<FileVersion>) {
        self.versions.merge_remote(listing);
    }

    /// Snapshot the content for a save without touching the version log
    pub fn prepare_save(&self, comment: Option<String>, is_minor_version: bool) -> PreparedSave {
        PreparedSave {
            draft: self.versions.draft(
                &self.editor.content(),
                comment,
                is_minor_version,
                &self.user,
            ),
            revision: self.editor.revision(),
        }
    }

    /// Record a save the store accepted
    pub fn complete_save(&mut self, prepared: PreparedSave, receipt: CheckInReceipt) -> Result<FileVersion> {
        let version = self
            .versions
            .commit(prepared.draft, receipt.version_id, receipt.created)?
            .clone();
        self.editor
            .mark_saved(prepared.revision, receipt.created, Some(version.id.clone()));
        Ok(version)
    }

    pub fn start_collaboration(&mut self, seq: u64) {
        let messages = self.collab.start(seq);
        self.outbox.extend(messages);
    }

    pub fn stop_collaboration(&mut self) {
        let messages = self.collab.stop();
        self.outbox.extend(messages);
    }

    pub fn update_cursor(&mut self, position: Option<usize>) {
        let message = self.collab.update_cursor(position);
        self.outbox.extend(message);
    }

    /// Feed a server message; returns whether a catch-up is needed
    ///
    /// # Errors
    ///
    /// `EditorError::Reconciliation` if a remote operation could not be
    /// applied. The session is degraded and must be resynced.
    pub fn receive(&mut self, message: ServerMessage) -> Result<bool> {
        let reception = self.collab.receive(message)?;
        self.integrate(reception)
    }

    pub fn begin_catch_up(&mut self) -> Result<u64> {
        self.collab.begin_catch_up()
    }

    pub fn finish_catch_up(&mut self, ops: Vec<SequencedOperation>) -> Result<()> {
        let reception = self.collab.finish_catch_up(ops);
        self.integrate(reception).map(|_| ())
    }

    pub fn mark_degraded(&mut self, reason: &str) {
        self.collab.mark_degraded(reason);
    }

    /// Replace the working copy with the server's; history and pending
    /// changes no longer describe it and are dropped
    pub fn resync(&mut self, snapshot: ServerSnapshot) {
        let dropped = self.changes.clear_pending();
        let version = self.editor.version().map(str::to_string);
        self.editor.reset(&snapshot.content, version);
        self.collab.resynced(snapshot.seq);
        tracing::info!(
            file = %self.file_id,
            seq = snapshot.seq,
            dropped,
            "working copy replaced by server snapshot"
        );
    }

    fn propagate(&mut self, edit: &AppliedEdit) {
        self.changes.rebase(&edit.forward);
        let message = self.collab.submit(&edit.forward);
        self.outbox.extend(message);
    }

    fn track_step(&mut self, step: &HistoryStep) {
        if step.change_id.is_some_and(|id| self.changes.is_accepted(id)) {
            return;
        }
        let Some(kind) = step.edit.forward.first().map(Operation::kind) else {
            return;
        };
        self.changes
            .record(Uuid::new_v4(), ChangeType::from(kind), &step.edit, &self.user);
    }

    fn integrate(&mut self, reception: Reception) -> Result<bool> {
        for remote in reception.remote {
            match self.editor.apply_remote(&remote.ops) {
                Ok(edit) => self.changes.rebase(&edit.forward),
                Err(e) => {
                    let reason = format!("seq {} from {}: {}", remote.seq, remote.user, e);
                    self.collab.mark_degraded(&reason);
                    return Err(EditorError::Reconciliation(reason));
                }
            }
        }
        self.outbox.extend(reception.outbound);
        Ok(reception.needs_catch_up)
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.editor.is_read_only() {
            Err(EditorError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

struct Shared {
    file_id: String,
    config: EditorConfig,
    core: Mutex<DocumentCore>,
    save_lock: tokio::sync::Mutex<()>,
    store: Arc<dyn VersionStore>,
    server: Option<Arc<dyn CollabServer>>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
}

impl Shared {
    fn with_core<R>(&self, f: impl FnOnce(&mut DocumentCore) -> R) -> R {
        let mut core = self.core.lock();
        let result = f(&mut *core);
        for message in core.take_outbound() {
            if self.outbound.send(message).is_err() {
                tracing::debug!(file = %self.file_id, "outbound channel closed");
                break;
            }
        }
        result
    }

    async fn persist(&self, comment: Option<String>, is_minor_version: bool) -> Result<FileVersion> {
        let _guard = self.save_lock.lock().await;

        let prepared = self.core.lock().prepare_save(comment, is_minor_version);
        let request = prepared.check_in();
        tracing::debug!(
            file = %self.file_id,
            version = request.version_number,
            "checking in"
        );

        let receipt = timed(
            self.config.autosave.request_timeout(),
            self.store.check_in(&self.file_id, &request),
        )
        .await?;
        let version = self.core.lock().complete_save(prepared, receipt)?;
        Ok(version)
    }
}

#[async_trait]
impl SaveTarget for Shared {
    fn has_unsaved_changes(&self) -> bool {
        self.core.lock().editor().has_unsaved_changes()
    }

    async fn save(&self) -> Result<()> {
        self.persist(Some(AUTOSAVE_COMMENT.to_string()), true)
            .await
            .map(|_| ())
    }
}

async fn timed<T>(limit: Duration, request: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, request)
        .await
        .map_err(|_| EditorError::Timeout(limit.as_millis() as u64))?
}

/// Async facade over one open file
pub struct OpenDocument {
    shared: Arc<Shared>,
    autosave: Mutex<AutoSaveScheduler>,
}

impl OpenDocument {
    /// Open a document over already-fetched content
    ///
    /// Returns the receiver the collaboration transport should drain.
    pub fn open(
        file_id: impl Into<String>,
        content: &str,
        config: EditorConfig,
        store: Arc<dyn VersionStore>,
        server: Option<Arc<dyn CollabServer>>,
    ) -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
        let file_id = file_id.into();
        let (outbound, rx) = mpsc::unbounded_channel();
        let autosave = AutoSaveScheduler::new(config.autosave.clone());
        let shared = Arc::new(Shared {
            core: Mutex::new(DocumentCore::new(file_id.clone(), content, &config)),
            file_id,
            config,
            save_lock: tokio::sync::Mutex::new(()),
            store,
            server,
            outbound,
        });

        (
            Self {
                shared,
                autosave: Mutex::new(autosave),
            },
            rx,
        )
    }

    /// Open a document at its current stored version
    pub async fn load(
        file_id: impl Into<String>,
        config: EditorConfig,
        store: Arc<dyn VersionStore>,
        server: Option<Arc<dyn CollabServer>>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ClientMessage>)> {
        let file_id = file_id.into();
        let limit = config.autosave.request_timeout();
        let listing = timed(limit, store.detailed_versions(&file_id)).await?;

        let current = listing.iter().find(|v| v.is_current_version).map(|v| v.id.clone());
        let content = match &current {
            Some(id) => timed(limit, store.version_content(&file_id, id)).await?,
            None => String::new(),
        };

        let (doc, rx) = Self::open(file_id, &content, config, store, server);
        doc.shared.with_core(|core| {
            core.merge_versions(listing);
            if let Some(id) = current {
                core.cache_version_content(&id, content);
                core.editor.set_version(Some(id));
            }
        });
        Ok((doc, rx))
    }

    pub fn file_id(&self) -> &str {
        &self.shared.file_id
    }

    /// Read a consistent view of the document
    pub fn read<R>(&self, f: impl FnOnce(&DocumentCore) -> R) -> R {
        let core = self.shared.core.lock();
        f(&*core)
    }

    pub fn content(&self) -> String {
        self.read(|core| core.content())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.read(|core| core.editor().has_unsaved_changes())
    }

    pub fn insert_text(&self, position: usize, text: &str) -> Result<ChangeId> {
        self.shared.with_core(|core| core.insert_text(position, text))
    }

    pub fn delete_text(&self, range: Range<usize>) -> Result<ChangeId> {
        self.shared.with_core(|core| core.delete_text(range))
    }

    pub fn replace_text(&self, range: Range<usize>, text: &str) -> Result<ChangeId> {
        self.shared.with_core(|core| core.replace_text(range, text))
    }

    pub fn apply_formatting(&self, range: Range<usize>, formatting: Formatting) -> Result<ChangeId> {
        self.shared
            .with_core(|core| core.apply_formatting(range, formatting))
    }

    pub fn undo(&self) -> Result<bool> {
        self.shared.with_core(|core| core.undo())
    }

    pub fn redo(&self) -> Result<bool> {
        self.shared.with_core(|core| core.redo())
    }

    pub fn accept_change(&self, id: ChangeId) -> Result<FileChange> {
        self.shared.with_core(|core| core.accept_change(id))
    }

    pub fn reject_change(&self, id: ChangeId) -> Result<FileChange> {
        self.shared.with_core(|core| core.reject_change(id))
    }

    pub fn accept_all(&self) -> Result<usize> {
        self.shared.with_core(|core| core.accept_all())
    }

    pub fn reject_all(&self) -> Result<usize> {
        self.shared.with_core(|core| core.reject_all())
    }

    /// Dispatch a key chord; returns the command it mapped to
    pub async fn handle_key(&self, chord: &KeyChord, selection: Range<usize>) -> Result<Option<EditorCommand>> {
        let read_only = self.read(|core| core.editor().is_read_only());
        let command = chord.command(read_only);
        match command {
            Some(EditorCommand::Save) => {
                self.save_file(None, false).await?;
            }
            Some(command) => {
                self.shared
                    .with_core(|core| core.execute(command, selection))?;
            }
            None => {}
        }
        Ok(command)
    }

    /// Check in the current content as a new version
    ///
    /// Resets the autosave timer on success.
    pub async fn save_file(&self, comment: Option<String>, is_minor_version: bool) -> Result<FileVersion> {
        let version = self.shared.persist(comment, is_minor_version).await?;
        self.autosave.lock().reset_timer();
        tracing::info!(
            file = %self.shared.file_id,
            version = version.version_number,
            "file saved"
        );
        Ok(version)
    }

    /// Restore an earlier version as one undoable change
    pub async fn load_version(&self, version_id: &str) -> Result<ChangeId> {
        let (known, cached) = self.read(|core| {
            (
                core.versions().get(version_id).is_some(),
                core.versions().snapshot(version_id).map(str::to_string),
            )
        });
        if !known {
            return Err(EditorError::VersionNotFound(version_id.to_string()));
        }

        let content = match cached {
            Some(content) => content,
            None => {
                let content = timed(
                    self.shared.config.autosave.request_timeout(),
                    self.shared
                        .store
                        .version_content(&self.shared.file_id, version_id),
                )
                .await?;
                self.shared
                    .with_core(|core| core.cache_version_content(version_id, content.clone()));
                content
            }
        };

        self.shared
            .with_core(|core| core.restore_version(version_id, &content))
    }

    pub async fn add_tag(&self, version_id: &str, tag: &str) -> Result<FileVersion> {
        if self.read(|core| core.versions().get(version_id).is_none()) {
            return Err(EditorError::VersionNotFound(version_id.to_string()));
        }
        timed(
            self.shared.config.autosave.request_timeout(),
            self.shared.store.add_tag(&self.shared.file_id, version_id, tag),
        )
        .await?;
        self.shared.with_core(|core| core.tag_version(version_id, tag))
    }

    /// Fold the store's version listing into the local log
    pub async fn refresh_versions(&self) -> Result<Vec<FileVersion>> {
        let listing = timed(
            self.shared.config.autosave.request_timeout(),
            self.shared.store.detailed_versions(&self.shared.file_id),
        )
        .await?;
        Ok(self.shared.with_core(|core| {
            core.merge_versions(listing);
            core.versions().versions().to_vec()
        }))
    }

    /// Line diff between two versions, locally when both snapshots are known
    pub async fn compare(&self, older_id: &str, newer_id: &str) -> Result<VersionComparison> {
        match self.read(|core| core.versions().compare(older_id, newer_id)) {
            Err(EditorError::VersionNotFound(_)) => {
                timed(
                    self.shared.config.autosave.request_timeout(),
                    self.shared
                        .store
                        .compare(&self.shared.file_id, older_id, newer_id),
                )
                .await
            }
            local => local,
        }
    }

    pub async fn backup(&self, include_version_history: bool, description: Option<String>) -> Result<BackupDescriptor> {
        let request = BackupRequest {
            include_version_history,
            description,
        };
        timed(
            self.shared.config.autosave.request_timeout(),
            self.shared.store.backup(&self.shared.file_id, &request),
        )
        .await
    }

    /// Start periodic saving; must be called from within a tokio runtime
    pub fn start_autosave(&self) {
        let target: Arc<dyn SaveTarget> = self.shared.clone();
        self.autosave.lock().start(target);
    }

    pub fn stop_autosave(&self) {
        self.autosave.lock().stop();
    }

    pub fn autosave_events(&self) -> broadcast::Receiver<AutoSaveEvent> {
        self.autosave.lock().subscribe()
    }

    pub fn is_autosaving(&self) -> bool {
        self.autosave.lock().is_running()
    }

    /// Abort autosave and leave any session; content stays in memory
    pub fn close(&self) {
        self.stop_autosave();
        self.shared.with_core(|core| core.stop_collaboration());
        tracing::info!(file = %self.shared.file_id, "document closed");
    }

    /// Join the session at server sequence `seq`
    pub fn start_collaboration(&self, seq: u64) {
        self.shared.with_core(|core| core.start_collaboration(seq));
    }

    pub fn stop_collaboration(&self) {
        self.shared.with_core(|core| core.stop_collaboration());
    }

    pub fn update_cursor(&self, position: Option<usize>) {
        self.shared.with_core(|core| core.update_cursor(position));
    }

    pub fn sync_state(&self) -> SyncState {
        self.read(|core| core.collab().state())
    }

    /// Apply one message from the collaboration transport
    ///
    /// Gaps trigger a catch-up; reconciliation failures a full resync.
    pub async fn handle_server_message(&self, message: ServerMessage) -> Result<()> {
        let outcome = self.shared.with_core(|core| core.receive(message));
        match outcome {
            Ok(false) => Ok(()),
            Ok(true) => self.catch_up().await,
            Err(EditorError::Reconciliation(_)) => self.resync().await,
            Err(e) => Err(e),
        }
    }

    /// Resume after a dropped connection
    pub async fn reconnect(&self) -> Result<()> {
        match self.sync_state() {
            SyncState::Offline => Err(EditorError::NotCollaborating),
            SyncState::Degraded => self.resync().await,
            SyncState::Live | SyncState::CatchingUp => self.catch_up().await,
        }
    }

    /// Drain server messages until the transport closes
    pub async fn run_inbound(&self, mut inbound: mpsc::UnboundedReceiver<ServerMessage>) {
        while let Some(message) = inbound.recv().await {
            if let Err(e) = self.handle_server_message(message).await {
                tracing::warn!(file = %self.shared.file_id, error = %e, "inbound message failed");
            }
        }
    }

    fn server(&self) -> Result<Arc<dyn CollabServer>> {
        self.shared
            .server
            .clone()
            .ok_or(EditorError::NotCollaborating)
    }

    async fn catch_up(&self) -> Result<()> {
        let server = self.server()?;
        let since = self.shared.with_core(|core| core.begin_catch_up())?;

        let fetched = timed(
            self.shared.config.collaboration.catch_up_timeout(),
            server.operations_since(&self.shared.file_id, since),
        )
        .await;

        match fetched {
            Ok(ops) => {
                let integrated = self.shared.with_core(|core| core.finish_catch_up(ops));
                match integrated {
                    Ok(()) => Ok(()),
                    Err(_) => self.resync().await,
                }
            }
            Err(e @ EditorError::HistoryTruncated { .. }) => {
                let reason = e.to_string();
                self.shared.with_core(|core| core.mark_degraded(&reason));
                self.resync().await
            }
            Err(e) => Err(e),
        }
    }

    /// Save the local copy as a version, then adopt the server snapshot
    ///
    /// If the local save fails nothing is replaced and the session stays
    /// degraded.
    async fn resync(&self) -> Result<()> {
        let server = self.server()?;
        let saved = self
            .shared
            .persist(Some(RESYNC_COMMENT.to_string()), true)
            .await?;
        let snapshot = timed(
            self.shared.config.collaboration.catch_up_timeout(),
            server.snapshot(&self.shared.file_id),
        )
        .await?;

        self.shared.with_core(|core| core.resync(snapshot));
        tracing::info!(
            file = %self.shared.file_id,
            version = saved.version_number,
            "recovered degraded session"
        );
        Ok(())
    }
}
