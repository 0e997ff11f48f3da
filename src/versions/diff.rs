//! Line diff between two snapshots
//!
//! Myers line diff via `similar`. Inside each hunk, paired removed/added
//! lines count as modifications; the remainder are plain additions or
//! deletions.

use serde::{Deserialize, Serialize};
use similar::{DiffOp, TextDiff};
use std::borrow::Cow;

/// Aggregate diff counts stored on each version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiffStats {
    pub additions: usize,
    pub deletions: usize,
    pub modifications: usize,
}

/// A line present on only one side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    /// 1-based line number on its side
    pub line: usize,
    pub text: String,
}

/// A line changed in place
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineModification {
    /// 1-based line number in the newer text
    pub line: usize,
    pub old_text: String,
    pub new_text: String,
}

/// Full comparison between two versions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionComparison {
    pub additions: Vec<LineChange>,
    pub deletions: Vec<LineChange>,
    pub modifications: Vec<LineModification>,
}

impl VersionComparison {
    pub fn stats(&self) -> DiffStats {
        DiffStats {
            additions: self.additions.len(),
            deletions: self.deletions.len(),
            modifications: self.modifications.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty() && self.modifications.is_empty()
    }
}

/// Compare `old` against `new`
pub fn compare(old: &str, new: &str) -> VersionComparison {
    let old = terminated(old);
    let new = terminated(new);
    let diff = TextDiff::from_lines(&*old, &*new);
    let old_lines = diff.old_slices();
    let new_lines = diff.new_slices();

    let mut comparison = VersionComparison::default();
    let mut removed: Vec<(usize, &str)> = Vec::new();
    let mut added: Vec<(usize, &str)> = Vec::new();

    for op in diff.ops() {
        if let DiffOp::Equal { .. } = op {
            flush_hunk(&mut comparison, &mut removed, &mut added);
            continue;
        }
        let old_range = op.old_range();
        let new_range = op.new_range();
        removed.extend(
            old_range
                .clone()
                .zip(&old_lines[old_range])
                .map(|(i, l)| (i + 1, line_text(l))),
        );
        added.extend(
            new_range
                .clone()
                .zip(&new_lines[new_range])
                .map(|(j, l)| (j + 1, line_text(l))),
        );
    }
    flush_hunk(&mut comparison, &mut removed, &mut added);

    comparison
}

/// A missing final newline must not make the last line differ
fn terminated(text: &str) -> Cow<'_, str> {
    if text.is_empty() || text.ends_with('\n') {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{}\n", text))
    }
}

fn line_text(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

fn flush_hunk(
    comparison: &mut VersionComparison,
    removed: &mut Vec<(usize, &str)>,
    added: &mut Vec<(usize, &str)>,
) {
    let paired = removed.len().min(added.len());
    for ((_, old_text), (line, new_text)) in removed.iter().zip(added.iter()).take(paired) {
        comparison.modifications.push(LineModification {
            line: *line,
            old_text: old_text.to_string(),
            new_text: new_text.to_string(),
        });
    }
    for (line, text) in removed.drain(..).skip(paired) {
        comparison.deletions.push(LineChange {
            line,
            text: text.to_string(),
        });
    }
    for (line, text) in added.drain(..).skip(paired) {
        comparison.additions.push(LineChange {
            line,
            text: text.to_string(),
        });
    }
}
