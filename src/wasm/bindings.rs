//! JavaScript bindings for the editing core
//!
//! Structured values cross the boundary as JSON strings. Network I/O stays
//! on the JavaScript side: the host drains `takeOutbound`, feeds server
//! messages to `receive`, and performs check-ins between `prepareSave` and
//! `completeSave`.
//!
//! Recovery is host-driven too. When `receive` reports a gap, the host calls
//! `beginCatchUp`, fetches the operations since the returned sequence number
//! and hands them to `finishCatchUp`. When `receive` or `finishCatchUp`
//! fails, the session is degraded: the host saves the local copy as a
//! version, fetches the server snapshot and calls `resync`.

use crate::backend::{CheckInReceipt, ServerSnapshot};
use crate::changes::ChangeId;
use crate::config::EditorConfig;
use crate::document::{DocumentCore, PreparedSave};
use crate::editor::{EditorCommand, FormatAttribute, Formatting, KeyChord};
use crate::collab::{SequencedOperation, ServerMessage};
use std::fmt::Display;
use wasm_bindgen::prelude::*;

fn js_error(context: &str, e: impl Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| js_error("JSON serialization failed", e))
}

fn parse_change_id(id: &str) -> Result<ChangeId, JsValue> {
    ChangeId::parse_str(id).map_err(|e| js_error("Invalid change id", e))
}

/// JavaScript-friendly wrapper for one open document
#[wasm_bindgen]
pub struct WasmEditor {
    inner: DocumentCore,
    prepared: Option<PreparedSave>,
}

#[wasm_bindgen]
impl WasmEditor {
    /// Open a document; `config_json` is an optional `EditorConfig`
    #[wasm_bindgen(constructor)]
    pub fn new(file_id: String, content: String, config_json: Option<String>) -> Result<WasmEditor, JsValue> {
        let config = match config_json {
            Some(json) => EditorConfig::from_json(&json).map_err(|e| js_error("Invalid config", e))?,
            None => EditorConfig::default(),
        };
        Ok(Self {
            inner: DocumentCore::new(file_id, &content, &config),
            prepared: None,
        })
    }

    /// Insert text; returns the new change id
    #[wasm_bindgen(js_name = insertText)]
    pub fn insert_text(&mut self, position: usize, text: String) -> Result<String, JsValue> {
        self.inner
            .insert_text(position, &text)
            .map(|id| id.to_string())
            .map_err(|e| js_error("Insert failed", e))
    }

    #[wasm_bindgen(js_name = deleteText)]
    pub fn delete_text(&mut self, start: usize, end: usize) -> Result<String, JsValue> {
        self.inner
            .delete_text(start..end)
            .map(|id| id.to_string())
            .map_err(|e| js_error("Delete failed", e))
    }

    #[wasm_bindgen(js_name = replaceText)]
    pub fn replace_text(&mut self, start: usize, end: usize, text: String) -> Result<String, JsValue> {
        self.inner
            .replace_text(start..end, &text)
            .map(|id| id.to_string())
            .map_err(|e| js_error("Replace failed", e))
    }

    /// Apply formatting, e.g. `{"attribute":"alignment","value":"center"}`
    #[wasm_bindgen(js_name = applyFormatting)]
    pub fn apply_formatting(&mut self, start: usize, end: usize, formatting_json: &str) -> Result<String, JsValue> {
        let formatting: Formatting =
            serde_json::from_str(formatting_json).map_err(|e| js_error("JSON parse failed", e))?;
        self.inner
            .apply_formatting(start..end, formatting)
            .map(|id| id.to_string())
            .map_err(|e| js_error("Formatting failed", e))
    }

    /// Toggle `"bold"`, `"italic"` or `"underline"` over the selection
    #[wasm_bindgen(js_name = toggleFormatting)]
    pub fn toggle_formatting(&mut self, start: usize, end: usize, attribute: &str) -> Result<String, JsValue> {
        let attribute: FormatAttribute = serde_json::from_value(serde_json::Value::String(attribute.to_string()))
            .map_err(|e| js_error("Unknown attribute", e))?;
        self.inner
            .toggle_formatting(start..end, attribute)
            .map(|id| id.to_string())
            .map_err(|e| js_error("Formatting failed", e))
    }

    #[wasm_bindgen(js_name = undo)]
    pub fn undo(&mut self) -> Result<bool, JsValue> {
        self.inner.undo().map_err(|e| js_error("Undo failed", e))
    }

    #[wasm_bindgen(js_name = redo)]
    pub fn redo(&mut self) -> Result<bool, JsValue> {
        self.inner.redo().map_err(|e| js_error("Redo failed", e))
    }

    /// Dispatch a key chord (JSON `KeyChord`) against the selection
    ///
    /// Returns the command as JSON, or `undefined` for unbound chords. A
    /// `save` command is returned for the host to perform.
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&mut self, chord_json: &str, start: usize, end: usize) -> Result<Option<String>, JsValue> {
        let chord: KeyChord = serde_json::from_str(chord_json).map_err(|e| js_error("JSON parse failed", e))?;
        let Some(command) = chord.command(self.inner.editor().is_read_only()) else {
            return Ok(None);
        };
        if command != EditorCommand::Save {
            self.inner
                .execute(command, start..end)
                .map_err(|e| js_error("Command failed", e))?;
        }
        to_json(&command).map(Some)
    }

    #[wasm_bindgen(js_name = acceptChange)]
    pub fn accept_change(&mut self, id: &str) -> Result<(), JsValue> {
        self.inner
            .accept_change(parse_change_id(id)?)
            .map(|_| ())
            .map_err(|e| js_error("Accept failed", e))
    }

    #[wasm_bindgen(js_name = rejectChange)]
    pub fn reject_change(&mut self, id: &str) -> Result<(), JsValue> {
        self.inner
            .reject_change(parse_change_id(id)?)
            .map(|_| ())
            .map_err(|e| js_error("Reject failed", e))
    }

    #[wasm_bindgen(js_name = acceptAll)]
    pub fn accept_all(&mut self) -> Result<usize, JsValue> {
        self.inner.accept_all().map_err(|e| js_error("Accept failed", e))
    }

    #[wasm_bindgen(js_name = rejectAll)]
    pub fn reject_all(&mut self) -> Result<usize, JsValue> {
        self.inner.reject_all().map_err(|e| js_error("Reject failed", e))
    }

    /// Pending changes as a JSON array, in display order
    #[wasm_bindgen(js_name = pendingChanges)]
    pub fn pending_changes(&self) -> Result<String, JsValue> {
        to_json(&self.inner.changes().pending())
    }

    #[wasm_bindgen(js_name = content)]
    pub fn content(&self) -> String {
        self.inner.content()
    }

    /// Per-character styles as a JSON array
    #[wasm_bindgen(js_name = styles)]
    pub fn styles(&self) -> Result<String, JsValue> {
        to_json(&self.inner.editor().styles())
    }

    #[wasm_bindgen(js_name = canUndo)]
    pub fn can_undo(&self) -> bool {
        self.inner.editor().can_undo()
    }

    #[wasm_bindgen(js_name = canRedo)]
    pub fn can_redo(&self) -> bool {
        self.inner.editor().can_redo()
    }

    #[wasm_bindgen(js_name = hasUnsavedChanges)]
    pub fn has_unsaved_changes(&self) -> bool {
        self.inner.editor().has_unsaved_changes()
    }

    /// Snapshot the content for a check-in; returns the request body as JSON
    #[wasm_bindgen(js_name = prepareSave)]
    pub fn prepare_save(&mut self, comment: Option<String>, is_minor_version: bool) -> Result<String, JsValue> {
        let prepared = self.inner.prepare_save(comment, is_minor_version);
        let body = to_json(&prepared.check_in())?;
        self.prepared = Some(prepared);
        Ok(body)
    }

    /// Record the store's receipt for the last prepared save
    #[wasm_bindgen(js_name = completeSave)]
    pub fn complete_save(&mut self, receipt_json: &str) -> Result<String, JsValue> {
        let receipt: CheckInReceipt =
            serde_json::from_str(receipt_json).map_err(|e| js_error("JSON parse failed", e))?;
        let prepared = self
            .prepared
            .take()
            .ok_or_else(|| JsValue::from_str("No save in progress"))?;
        let version = self
            .inner
            .complete_save(prepared, receipt)
            .map_err(|e| js_error("Save failed", e))?;
        to_json(&version)
    }

    /// Version log as a JSON array
    #[wasm_bindgen(js_name = versions)]
    pub fn versions(&self) -> Result<String, JsValue> {
        to_json(&self.inner.versions().versions())
    }

    #[wasm_bindgen(js_name = startCollaboration)]
    pub fn start_collaboration(&mut self, seq: u64) {
        self.inner.start_collaboration(seq);
    }

    #[wasm_bindgen(js_name = stopCollaboration)]
    pub fn stop_collaboration(&mut self) {
        self.inner.stop_collaboration();
    }

    #[wasm_bindgen(js_name = updateCursor)]
    pub fn update_cursor(&mut self, position: Option<usize>) {
        self.inner.update_cursor(position);
    }

    /// Feed a server message; returns true when the host should catch up
    #[wasm_bindgen(js_name = receive)]
    pub fn receive(&mut self, message_json: &str) -> Result<bool, JsValue> {
        let message = ServerMessage::from_json(message_json).map_err(|e| js_error("JSON parse failed", e))?;
        self.inner
            .receive(message)
            .map_err(|e| js_error("Reconciliation failed", e))
    }

    /// Enter catch-up; returns the sequence number to fetch operations since
    #[wasm_bindgen(js_name = beginCatchUp)]
    pub fn begin_catch_up(&mut self) -> Result<u64, JsValue> {
        self.inner
            .begin_catch_up()
            .map_err(|e| js_error("Catch-up failed", e))
    }

    /// Integrate a JSON array of sequenced operations and go live again
    #[wasm_bindgen(js_name = finishCatchUp)]
    pub fn finish_catch_up(&mut self, ops_json: &str) -> Result<(), JsValue> {
        let ops: Vec<SequencedOperation> =
            serde_json::from_str(ops_json).map_err(|e| js_error("JSON parse failed", e))?;
        self.inner
            .finish_catch_up(ops)
            .map_err(|e| js_error("Reconciliation failed", e))
    }

    #[wasm_bindgen(js_name = markDegraded)]
    pub fn mark_degraded(&mut self, reason: &str) {
        self.inner.mark_degraded(reason);
    }

    /// Adopt the server snapshot (`{seq, content}`) after a degraded session
    ///
    /// Pending changes and history are dropped; save the local copy first.
    #[wasm_bindgen(js_name = resync)]
    pub fn resync(&mut self, snapshot_json: &str) -> Result<(), JsValue> {
        let snapshot: ServerSnapshot =
            serde_json::from_str(snapshot_json).map_err(|e| js_error("JSON parse failed", e))?;
        self.inner.resync(snapshot);
        Ok(())
    }

    /// `"offline"`, `"live"`, `"catchingUp"` or `"degraded"`
    #[wasm_bindgen(js_name = syncState)]
    pub fn sync_state(&self) -> Result<String, JsValue> {
        serde_json::to_value(self.inner.collab().state())
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .ok_or_else(|| JsValue::from_str("Unknown sync state"))
    }

    #[wasm_bindgen(js_name = lastAcked)]
    pub fn last_acked(&self) -> u64 {
        self.inner.collab().last_acked()
    }

    /// Outbound collaboration messages as a JSON array
    #[wasm_bindgen(js_name = takeOutbound)]
    pub fn take_outbound(&mut self) -> Result<String, JsValue> {
        to_json(&self.inner.take_outbound())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_up_and_resync_round() {
        let mut editor = WasmEditor::new("file-1".into(), "abc".into(), None).unwrap();
        editor.start_collaboration(0);
        assert_eq!(editor.sync_state().unwrap(), "live");

        assert_eq!(editor.begin_catch_up().unwrap(), 0);
        assert_eq!(editor.sync_state().unwrap(), "catchingUp");
        editor
            .finish_catch_up(
                r#"[{"seq":1,"opId":"5f0c1f5e-8a3b-4f7e-9a61-0d2c4b6e8f10","user":"bob",
                    "operation":[{"type":"insert","position":3,"text":"d"}]}]"#,
            )
            .unwrap();
        assert_eq!(editor.content(), "abcd");
        assert_eq!(editor.last_acked(), 1);
        assert_eq!(editor.sync_state().unwrap(), "live");

        editor.mark_degraded("apply failed");
        assert_eq!(editor.sync_state().unwrap(), "degraded");
        editor.resync(r#"{"seq":5,"content":"server copy"}"#).unwrap();
        assert_eq!(editor.content(), "server copy");
        assert_eq!(editor.last_acked(), 5);
        assert_eq!(editor.sync_state().unwrap(), "live");
    }
}
