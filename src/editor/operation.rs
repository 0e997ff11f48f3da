//! Operation: an atomic content mutation with a computable inverse
//!
//! Positions and ranges are in characters, half-open `[start, end)`.
//! Applying an operation validates it against the current text first, so a
//! rejected operation never leaves a partial edit behind.
//!
//! # Example
//!
//! ```rust
//! use coedit_core::editor::{DocumentText, Operation};
//!
//! let mut text = DocumentText::from_text("Hello");
//! let inverse = Operation::insert(5, " World").apply(&mut text).unwrap();
//! assert_eq!(text.to_string(), "Hello World");
//!
//! inverse.apply(&mut text).unwrap();
//! assert_eq!(text.to_string(), "Hello");
//! ```

use super::format::{CharStyle, FormatChange, Formatting};
use super::text::DocumentText;
use crate::error::{EditorError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Discriminant of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Delete,
    Replace,
    Format,
}

/// Atomic content mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Insert {
        position: usize,
        text: String,
        /// Explicit styles for the inserted chars (empty = unformatted)
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        styles: Vec<CharStyle>,
    },
    Delete {
        range: Range<usize>,
    },
    Replace {
        range: Range<usize>,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        styles: Vec<CharStyle>,
    },
    Format {
        range: Range<usize>,
        change: FormatChange,
    },
}

impl Operation {
    pub fn insert(position: usize, text: impl Into<String>) -> Self {
        Operation::Insert {
            position,
            text: text.into(),
            styles: Vec::new(),
        }
    }

    pub fn delete(range: Range<usize>) -> Self {
        Operation::Delete { range }
    }

    pub fn replace(range: Range<usize>, text: impl Into<String>) -> Self {
        Operation::Replace {
            range,
            text: text.into(),
            styles: Vec::new(),
        }
    }

    pub fn format(range: Range<usize>, formatting: Formatting) -> Self {
        Operation::Format {
            range,
            change: FormatChange::Set(formatting),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Insert { .. } => OperationKind::Insert,
            Operation::Delete { .. } => OperationKind::Delete,
            Operation::Replace { .. } => OperationKind::Replace,
            Operation::Format { .. } => OperationKind::Format,
        }
    }

    /// Range of existing text the operation targets (empty for inserts)
    pub fn range(&self) -> Range<usize> {
        match self {
            Operation::Insert { position, .. } => *position..*position,
            Operation::Delete { range }
            | Operation::Replace { range, .. }
            | Operation::Format { range, .. } => range.clone(),
        }
    }

    /// Text the operation writes, if any
    pub fn text(&self) -> Option<&str> {
        match self {
            Operation::Insert { text, .. } | Operation::Replace { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Number of characters the operation inserts
    pub fn inserted_len(&self) -> usize {
        self.text().map(|t| t.chars().count()).unwrap_or(0)
    }

    /// True when applying the operation cannot change the document
    pub fn is_noop(&self) -> bool {
        match self {
            Operation::Insert { text, .. } => text.is_empty(),
            Operation::Delete { range } | Operation::Format { range, .. } => range.is_empty(),
            Operation::Replace { range, text, .. } => range.is_empty() && text.is_empty(),
        }
    }

    /// Check the operation against a document of `len` characters
    pub fn validate(&self, len: usize) -> Result<()> {
        let range = self.range();
        if range.start > range.end || range.end > len {
            return Err(EditorError::InvalidOperation(format!(
                "range {}..{} out of bounds (length: {})",
                range.start, range.end, len
            )));
        }

        match self {
            Operation::Insert { text, styles, .. } | Operation::Replace { text, styles, .. } => {
                if !styles.is_empty() && styles.len() != text.chars().count() {
                    return Err(EditorError::InvalidOperation(format!(
                        "{} styles supplied for {} characters",
                        styles.len(),
                        text.chars().count()
                    )));
                }
            }
            Operation::Format {
                change: FormatChange::Restore(styles),
                ..
            } => {
                if styles.len() != range.len() {
                    return Err(EditorError::InvalidOperation(format!(
                        "{} styles supplied for range of {} characters",
                        styles.len(),
                        range.len()
                    )));
                }
            }
            _ => {}
        }

        Ok(())
    }

    /// Apply to `text` and return the exact inverse
    ///
    /// # Errors
    ///
    /// Returns `EditorError::InvalidOperation` if the operation does not fit
    /// the current text. The text is untouched in that case.
    pub fn apply(&self, doc: &mut DocumentText) -> Result<Operation> {
        self.validate(doc.len())?;

        let inverse = match self {
            Operation::Insert {
                position,
                text,
                styles,
            } => {
                doc.insert(*position, text, styles);
                Operation::delete(*position..*position + text.chars().count())
            }
            Operation::Delete { range } => {
                let removed = doc.slice(range.clone());
                let removed_styles = doc.styles(range.clone());
                doc.remove(range.clone());
                Operation::Insert {
                    position: range.start,
                    text: removed,
                    styles: removed_styles,
                }
            }
            Operation::Replace {
                range,
                text,
                styles,
            } => {
                let removed = doc.slice(range.clone());
                let removed_styles = doc.styles(range.clone());
                doc.remove(range.clone());
                doc.insert(range.start, text, styles);
                Operation::Replace {
                    range: range.start..range.start + text.chars().count(),
                    text: removed,
                    styles: removed_styles,
                }
            }
            Operation::Format { range, change } => {
                let previous = doc.styles(range.clone());
                match change {
                    FormatChange::Set(formatting) => doc.set_format(range.clone(), *formatting),
                    FormatChange::Restore(styles) => doc.restore_styles(range.start, styles),
                }
                Operation::Format {
                    range: range.clone(),
                    change: FormatChange::Restore(previous),
                }
            }
        };

        Ok(inverse)
    }
}

/// Apply a sequence of operations atomically
///
/// Returns the inverse sequence (in application order). If any operation
/// fails, the ones already applied are rolled back before the error is
/// returned.
pub fn apply_all(ops: &[Operation], doc: &mut DocumentText) -> Result<Vec<Operation>> {
    let mut inverses = Vec::with_capacity(ops.len());
    for op in ops {
        match op.apply(doc) {
            Ok(inverse) => inverses.push(inverse),
            Err(e) => {
                for inverse in inverses.iter().rev() {
                    // Inverses of just-applied operations always fit
                    let _ = inverse.apply(doc);
                }
                return Err(e);
            }
        }
    }
    inverses.reverse();
    Ok(inverses)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::format::Alignment;
    use proptest::prelude::*;

    fn doc(text: &str) -> DocumentText {
        DocumentText::from_text(text)
    }

    #[test]
    fn test_insert_and_inverse() {
        let mut text = doc("");
        let inverse = Operation::insert(0, "Hello").apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "Hello");
        assert_eq!(inverse, Operation::delete(0..5));

        inverse.apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "");
    }

    #[test]
    fn test_delete_inverse_restores_formatting() {
        let mut text = doc("Hello World");
        Operation::format(0..5, Formatting::Bold(true))
            .apply(&mut text)
            .unwrap();

        let inverse = Operation::delete(2..8).apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "Herld");

        inverse.apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "Hello World");
        assert!(text.style_at(4).unwrap().bold);
        assert!(!text.style_at(5).unwrap().bold);
    }

    #[test]
    fn test_replace_inverse() {
        let mut text = doc("The cat sat");
        let inverse = Operation::replace(4..7, "tiger").apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "The tiger sat");

        inverse.apply(&mut text).unwrap();
        assert_eq!(text.to_string(), "The cat sat");
    }

    #[test]
    fn test_format_inverse_restores_previous_styles() {
        let mut text = doc("abcd");
        Operation::format(0..2, Formatting::Italic(true))
            .apply(&mut text)
            .unwrap();

        let inverse = Operation::format(1..4, Formatting::Alignment(Alignment::Right))
            .apply(&mut text)
            .unwrap();
        assert_eq!(text.style_at(3).unwrap().alignment, Alignment::Right);

        inverse.apply(&mut text).unwrap();
        assert!(text.style_at(1).unwrap().italic);
        assert_eq!(text.style_at(3).unwrap().alignment, Alignment::Left);
    }

    #[test]
    fn test_out_of_bounds_rejected_without_mutation() {
        let mut text = doc("Hello");

        let result = Operation::insert(10, "x").apply(&mut text);
        assert!(matches!(result, Err(EditorError::InvalidOperation(_))));

        let result = Operation::delete(3..9).apply(&mut text);
        assert!(matches!(result, Err(EditorError::InvalidOperation(_))));

        #[allow(clippy::reversed_empty_ranges)]
        let result = Operation::delete(4..2).apply(&mut text);
        assert!(result.is_err());

        assert_eq!(text.to_string(), "Hello");
    }

    #[test]
    fn test_mismatched_restore_rejected() {
        let mut text = doc("abc");
        let op = Operation::Format {
            range: 0..3,
            change: FormatChange::Restore(vec![CharStyle::default()]),
        };
        assert!(op.apply(&mut text).is_err());
    }

    #[test]
    fn test_apply_all_rolls_back() {
        let mut text = doc("abc");
        let ops = vec![Operation::insert(3, "def"), Operation::delete(0..20)];

        assert!(apply_all(&ops, &mut text).is_err());
        assert_eq!(text.to_string(), "abc");
    }

    #[test]
    fn test_serde_shape() {
        let json = serde_json::to_value(Operation::delete(1..3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "delete", "range": {"start": 1, "end": 3}})
        );

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, Operation::delete(1..3));
    }

    fn arb_op(len: usize) -> impl Strategy<Value = Operation> {
        let text = "[a-z ]{0,4}";
        prop_oneof![
            (0..=len, text).prop_map(|(p, t)| Operation::insert(p, t)),
            (0..=len, 0..=len).prop_map(|(a, b)| Operation::delete(a.min(b)..a.max(b))),
            (0..=len, 0..=len, text)
                .prop_map(|(a, b, t)| Operation::replace(a.min(b)..a.max(b), t)),
            (0..=len, 0..=len).prop_map(|(a, b)| Operation::format(
                a.min(b)..a.max(b),
                Formatting::Underline(true)
            )),
        ]
    }

    proptest! {
        #[test]
        fn prop_inverse_round_trip(
            base in "[a-z]{0,12}",
            op in arb_op(12),
        ) {
            let mut text = doc(&base);
            let before_styles = text.all_styles().to_vec();
            if let Ok(inverse) = op.apply(&mut text) {
                inverse.apply(&mut text).unwrap();
                prop_assert_eq!(text.to_string(), base);
                prop_assert_eq!(text.all_styles(), &before_styles[..]);
            } else {
                prop_assert_eq!(text.to_string(), base);
            }
        }
    }
}
