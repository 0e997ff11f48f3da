//! Character formatting
//!
//! Formatting is stored per character, parallel to the text. A format
//! operation captures the previous styles of its range so it can be undone
//! exactly.

use serde::{Deserialize, Serialize};

/// Paragraph alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Style of a single character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct CharStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub alignment: Alignment,
}

/// Attribute that can be toggled from the keyboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatAttribute {
    Bold,
    Italic,
    Underline,
}

/// A single formatting assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "attribute", content = "value", rename_all = "lowercase")]
pub enum Formatting {
    Bold(bool),
    Italic(bool),
    Underline(bool),
    Alignment(Alignment),
}

impl Formatting {
    /// Apply this assignment to a style
    pub fn apply_to(&self, style: &mut CharStyle) {
        match *self {
            Formatting::Bold(on) => style.bold = on,
            Formatting::Italic(on) => style.italic = on,
            Formatting::Underline(on) => style.underline = on,
            Formatting::Alignment(alignment) => style.alignment = alignment,
        }
    }

    /// Assignment that toggles `attribute` over a range with the given styles
    ///
    /// The attribute is switched on unless every character already has it.
    pub fn toggle(attribute: FormatAttribute, styles: &[CharStyle]) -> Self {
        let all_set = !styles.is_empty() && styles.iter().all(|s| attribute.is_set(s));
        let on = !all_set;
        match attribute {
            FormatAttribute::Bold => Formatting::Bold(on),
            FormatAttribute::Italic => Formatting::Italic(on),
            FormatAttribute::Underline => Formatting::Underline(on),
        }
    }
}

impl FormatAttribute {
    pub fn is_set(&self, style: &CharStyle) -> bool {
        match self {
            FormatAttribute::Bold => style.bold,
            FormatAttribute::Italic => style.italic,
            FormatAttribute::Underline => style.underline,
        }
    }
}

/// What a format operation does to its range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FormatChange {
    /// Assign one attribute to every character in the range
    Set(Formatting),
    /// Restore captured per-character styles (one entry per character)
    Restore(Vec<CharStyle>),
}
