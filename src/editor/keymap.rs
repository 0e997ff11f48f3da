//! Keyboard contract exposed to the surrounding UI
//!
//! Only the behaviour is defined here: which chord maps to which editor
//! command. Rendering and focus handling belong to the host.

use super::format::FormatAttribute;
use serde::{Deserialize, Serialize};

/// A key press with its modifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct KeyChord {
    pub key: char,
    #[serde(default)]
    pub ctrl: bool,
    /// Cmd on macOS
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

/// Command the editor performs for a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", content = "attribute", rename_all = "camelCase")]
pub enum EditorCommand {
    Save,
    Undo,
    Redo,
    ToggleFormat(FormatAttribute),
}

impl KeyChord {
    pub fn ctrl(key: char) -> Self {
        Self {
            key,
            ctrl: true,
            ..Self::default()
        }
    }

    pub fn meta(key: char) -> Self {
        Self {
            key,
            meta: true,
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// Map the chord to a command
    ///
    /// Returns `None` for unbound chords and for every chord when
    /// `read_only` is set.
    pub fn command(&self, read_only: bool) -> Option<EditorCommand> {
        if read_only || self.alt {
            return None;
        }

        let primary = self.ctrl || self.meta;
        if !primary {
            return None;
        }

        match (self.key.to_ascii_lowercase(), self.shift) {
            ('s', false) => Some(EditorCommand::Save),
            ('z', false) => Some(EditorCommand::Undo),
            ('z', true) => Some(EditorCommand::Redo),
            // Ctrl+Y only; Cmd+Y is history in most browsers
            ('y', false) if self.ctrl => Some(EditorCommand::Redo),
            ('b', false) => Some(EditorCommand::ToggleFormat(FormatAttribute::Bold)),
            ('i', false) => Some(EditorCommand::ToggleFormat(FormatAttribute::Italic)),
            ('u', false) => Some(EditorCommand::ToggleFormat(FormatAttribute::Underline)),
            _ => None,
        }
    }
}
