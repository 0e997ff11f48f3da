//! Document text storage
//!
//! Text lives in a rope (char-indexed, O(log n) edits); formatting is a
//! parallel vector with one `CharStyle` per character. Both are always the
//! same length.

use super::format::{CharStyle, Formatting};
use ropey::Rope;
use std::ops::Range;

/// Text plus per-character styles
#[derive(Debug, Clone, Default)]
pub struct DocumentText {
    rope: Rope,
    styles: Vec<CharStyle>,
}

impl DocumentText {
    /// Create an empty document
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document with unformatted text
    pub fn from_text(text: &str) -> Self {
        let rope = Rope::from_str(text);
        let styles = vec![CharStyle::default(); rope.len_chars()];
        Self { rope, styles }
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.rope.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len_chars() == 0
    }

    /// Text of a char range. Caller guarantees the range is in bounds.
    pub fn slice(&self, range: Range<usize>) -> String {
        self.rope.slice(range).to_string()
    }

    /// Styles of a char range. Caller guarantees the range is in bounds.
    pub fn styles(&self, range: Range<usize>) -> Vec<CharStyle> {
        self.styles[range].to_vec()
    }

    /// All per-character styles
    pub fn all_styles(&self) -> &[CharStyle] {
        &self.styles
    }

    pub fn style_at(&self, position: usize) -> Option<CharStyle> {
        self.styles.get(position).copied()
    }

    /// Insert text; `styles` is either empty (unformatted) or one per char
    pub(crate) fn insert(&mut self, position: usize, text: &str, styles: &[CharStyle]) {
        let count = text.chars().count();
        self.rope.insert(position, text);
        if styles.len() == count {
            self.styles.splice(position..position, styles.iter().copied());
        } else {
            self.styles.splice(
                position..position,
                std::iter::repeat(CharStyle::default()).take(count),
            );
        }
    }

    pub(crate) fn remove(&mut self, range: Range<usize>) {
        self.rope.remove(range.clone());
        self.styles.drain(range);
    }

    pub(crate) fn set_format(&mut self, range: Range<usize>, formatting: Formatting) {
        for style in &mut self.styles[range] {
            formatting.apply_to(style);
        }
    }

    pub(crate) fn restore_styles(&mut self, start: usize, styles: &[CharStyle]) {
        self.styles[start..start + styles.len()].copy_from_slice(styles);
    }
}

impl std::fmt::Display for DocumentText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for chunk in self.rope.chunks() {
            f.write_str(chunk)?;
        }
        Ok(())
    }
}
