//! Operational transform
//!
//! `transform_pair(a, b)` takes two operation sequences generated against the
//! same document and returns `(a', b')` such that applying `a` then `b'`
//! yields the same text as applying `b` then `a'`.
//!
//! Rules, per primitive:
//! - `Replace` is decomposed into `Delete` followed by `Insert`.
//! - Concurrent inserts at the same position are ordered by the tie-breaker.
//! - An insert inside a concurrently deleted range survives at the start of
//!   that range; the delete is split around it.
//! - Overlapping deletes only remove the overlap once.
//! - Format ranges follow the text they cover; text inserted concurrently
//!   inside a format range stays unformatted.
//! - Where two formats overlap, the one the tie-breaker orders second wins
//!   the overlapping characters; the other gives way there, so replicas end
//!   with the same styles whichever was applied first.
//!
//! # Example
//!
//! ```rust
//! use coedit_core::editor::{transform_pair, DocumentText, Operation, Tie};
//!
//! let a = vec![Operation::insert(2, "X")];
//! let b = vec![Operation::delete(0..3)];
//! let (a2, b2) = transform_pair(&a, &b, Tie::Left);
//!
//! let mut left = DocumentText::from_text("abcdef");
//! let mut right = left.clone();
//! for op in a.iter().chain(&b2) { op.apply(&mut left).unwrap(); }
//! for op in b.iter().chain(&a2) { op.apply(&mut right).unwrap(); }
//!
//! assert_eq!(left.to_string(), right.to_string());
//! assert_eq!(left.to_string(), "Xdef");
//! ```

use super::format::FormatChange;
use super::operation::Operation;
use std::mem::discriminant;
use std::ops::Range;

/// Which side wins when two inserts land on the same position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tie {
    /// The transformed operation's insert goes first
    Left,
    /// The other operation's insert goes first
    Right,
}

impl Tie {
    pub fn flip(self) -> Self {
        match self {
            Tie::Left => Tie::Right,
            Tie::Right => Tie::Left,
        }
    }

    /// Deterministic tie-break between two operations by their ids
    pub fn between<T: Ord>(op_id: &T, other_id: &T) -> Self {
        if op_id < other_id {
            Tie::Left
        } else {
            Tie::Right
        }
    }
}

/// Split operations into primitives (no `Replace`, no no-ops)
pub fn decompose(ops: &[Operation]) -> Vec<Operation> {
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        match op {
            Operation::Replace {
                range,
                text,
                styles,
            } => {
                if !range.is_empty() {
                    out.push(Operation::delete(range.clone()));
                }
                if !text.is_empty() {
                    out.push(Operation::Insert {
                        position: range.start,
                        text: text.clone(),
                        styles: styles.clone(),
                    });
                }
            }
            op if op.is_noop() => {}
            op => out.push(op.clone()),
        }
    }
    out
}

/// Transform two concurrent sequences against each other
///
/// `tie` decides same-position inserts from `a`'s point of view.
pub fn transform_pair(
    a: &[Operation],
    b: &[Operation],
    tie: Tie,
) -> (Vec<Operation>, Vec<Operation>) {
    pair(&decompose(a), &decompose(b), tie)
}

/// Rebase `op` so it applies after `against`
pub fn transform(op: &Operation, against: &[Operation], tie: Tie) -> Vec<Operation> {
    transform_pair(std::slice::from_ref(op), against, tie).0
}

/// Map a caret position through an applied operation
///
/// Inserts at the caret leave it in place; a caret inside a deleted range
/// moves to the start of the range.
pub fn transform_position(position: usize, op: &Operation) -> usize {
    decompose(std::slice::from_ref(op))
        .iter()
        .fold(position, |pos, primitive| match primitive {
            Operation::Insert { position: at, .. } if *at < pos => pos + primitive.inserted_len(),
            Operation::Delete { range } => map_through_delete(pos, range),
            _ => pos,
        })
}

fn pair(a: &[Operation], b: &[Operation], tie: Tie) -> (Vec<Operation>, Vec<Operation>) {
    if a.is_empty() || b.is_empty() {
        return (a.to_vec(), b.to_vec());
    }

    if a.len() > 1 {
        let (head, b1) = pair(&a[..1], b, tie);
        let (tail, b2) = pair(&a[1..], &b1, tie);
        return ([head, tail].concat(), b2);
    }

    if b.len() > 1 {
        let (a1, head) = pair(a, &b[..1], tie);
        let (a2, tail) = pair(&a1, &b[1..], tie);
        return (a2, [head, tail].concat());
    }

    (
        transform_primitive(&a[0], &b[0], tie),
        transform_primitive(&b[0], &a[0], tie.flip()),
    )
}

fn transform_primitive(op: &Operation, against: &Operation, tie: Tie) -> Vec<Operation> {
    match (op, against) {
        (
            Operation::Insert {
                position,
                text,
                styles,
            },
            Operation::Insert { position: at, .. },
        ) => {
            let shift = *at < *position || (*at == *position && tie == Tie::Right);
            let position = if shift {
                position + against.inserted_len()
            } else {
                *position
            };
            vec![Operation::Insert {
                position,
                text: text.clone(),
                styles: styles.clone(),
            }]
        }

        (
            Operation::Insert {
                position,
                text,
                styles,
            },
            Operation::Delete { range },
        ) => vec![Operation::Insert {
            position: map_through_delete(*position, range),
            text: text.clone(),
            styles: styles.clone(),
        }],

        (Operation::Delete { range }, Operation::Insert { position: at, .. }) => {
            split_around(range, *at, against.inserted_len())
                .into_iter()
                .map(|(range, _)| Operation::delete(range))
                .collect()
        }

        (Operation::Delete { range }, Operation::Delete { range: removed }) => {
            let mapped = map_range_through_delete(range, removed);
            if mapped.is_empty() {
                Vec::new()
            } else {
                vec![Operation::delete(mapped)]
            }
        }

        (Operation::Format { range, change }, Operation::Insert { position: at, .. }) => {
            split_around(range, *at, against.inserted_len())
                .into_iter()
                .map(|(piece, offset)| Operation::Format {
                    range: piece.clone(),
                    change: slice_change(change, offset..offset + piece.len()),
                })
                .collect()
        }

        (Operation::Format { range, change }, Operation::Delete { range: removed }) => {
            let mapped = map_range_through_delete(range, removed);
            if mapped.is_empty() {
                return Vec::new();
            }
            let change = match change {
                FormatChange::Set(formatting) => FormatChange::Set(*formatting),
                FormatChange::Restore(styles) => FormatChange::Restore(
                    range
                        .clone()
                        .zip(styles.iter())
                        .filter(|(i, _)| !removed.contains(i))
                        .map(|(_, style)| *style)
                        .collect(),
                ),
            };
            vec![Operation::Format {
                range: mapped,
                change,
            }]
        }

        (
            Operation::Format { range, change },
            Operation::Format {
                range: other,
                change: winning,
            },
        ) => {
            if tie == Tie::Right {
                vec![op.clone()]
            } else {
                give_way(range, change, other, winning)
            }
        }

        // Formatting never moves text
        (_, Operation::Format { .. }) => vec![op.clone()],

        // Non-primitive input: decompose and go through the sequence path
        _ => pair(&decompose(std::slice::from_ref(op)), &decompose(std::slice::from_ref(against)), tie).0,
    }
}

/// Rewrite a format so that applying it after `winning` leaves the
/// overlapping characters as `winning` set them
fn give_way(
    range: &Range<usize>,
    change: &FormatChange,
    other: &Range<usize>,
    winning: &FormatChange,
) -> Vec<Operation> {
    let overlap = range.start.max(other.start)..range.end.min(other.end);
    let unchanged = Operation::Format {
        range: range.clone(),
        change: change.clone(),
    };
    if overlap.is_empty() {
        return vec![unchanged];
    }

    match change {
        FormatChange::Restore(styles) => {
            let mut styles = styles.clone();
            for i in overlap {
                let Some(style) = styles.get_mut(i - range.start) else {
                    continue;
                };
                match winning {
                    FormatChange::Set(formatting) => formatting.apply_to(style),
                    FormatChange::Restore(theirs) => {
                        if let Some(theirs) = theirs.get(i - other.start) {
                            *style = *theirs;
                        }
                    }
                }
            }
            vec![Operation::Format {
                range: range.clone(),
                change: FormatChange::Restore(styles),
            }]
        }
        FormatChange::Set(formatting) => {
            let conflicts = match winning {
                FormatChange::Set(theirs) => discriminant(formatting) == discriminant(theirs),
                FormatChange::Restore(_) => true,
            };
            if !conflicts {
                return vec![unchanged];
            }
            [range.start..overlap.start, overlap.end..range.end]
                .into_iter()
                .filter(|piece| !piece.is_empty())
                .map(|piece| Operation::Format {
                    range: piece,
                    change: FormatChange::Set(*formatting),
                })
                .collect()
        }
    }
}

fn map_through_delete(position: usize, removed: &Range<usize>) -> usize {
    if position <= removed.start {
        position
    } else if position >= removed.end {
        position - removed.len()
    } else {
        removed.start
    }
}

fn map_range_through_delete(range: &Range<usize>, removed: &Range<usize>) -> Range<usize> {
    map_through_delete(range.start, removed)..map_through_delete(range.end, removed)
}

/// Pieces of `range` after an insert of `len` chars at `at`, highest first,
/// each with its offset into the original range
fn split_around(range: &Range<usize>, at: usize, len: usize) -> Vec<(Range<usize>, usize)> {
    if at <= range.start {
        vec![(range.start + len..range.end + len, 0)]
    } else if at >= range.end {
        vec![(range.clone(), 0)]
    } else {
        vec![
            (at + len..range.end + len, at - range.start),
            (range.start..at, 0),
        ]
    }
}

fn slice_change(change: &FormatChange, offsets: Range<usize>) -> FormatChange {
    match change {
        FormatChange::Set(formatting) => FormatChange::Set(*formatting),
        FormatChange::Restore(styles) => FormatChange::Restore(styles[offsets].to_vec()),
    }
}
