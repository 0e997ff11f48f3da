//! Reference sequencer
//!
//! The server half of the protocol: it owns the canonical text, assigns
//! sequence numbers, and rewrites each submitted operation so it applies on
//! top of everything sequenced before it. History is bounded; clients that
//! fall behind the oldest retained entry must resync from a snapshot.

use super::messages::{OperationMessage, SequencedOperation};
use crate::backend::ServerSnapshot;
use crate::editor::{apply_all, transform_pair, DocumentText, Tie};
use crate::error::{EditorError, Result};
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct Sequencer {
    text: DocumentText,
    seq: u64,
    history: VecDeque<SequencedOperation>,
    history_limit: usize,
}

impl Sequencer {
    pub fn new(content: &str, history_limit: usize) -> Self {
        Self {
            text: DocumentText::from_text(content),
            seq: 0,
            history: VecDeque::new(),
            history_limit: history_limit.max(1),
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn content(&self) -> String {
        self.text.to_string()
    }

    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            seq: self.seq,
            content: self.content(),
        }
    }

    /// Oldest base sequence number history can still serve
    pub fn oldest_base(&self) -> u64 {
        self.history.front().map(|h| h.seq - 1).unwrap_or(self.seq)
    }

    /// Sequence a client operation
    ///
    /// Resubmissions of an already sequenced op id return the original
    /// entry unchanged.
    pub fn submit(&mut self, message: &OperationMessage) -> Result<SequencedOperation> {
        if let Some(existing) = self.history.iter().find(|h| h.op_id == message.op_id) {
            return Ok(existing.clone());
        }
        if message.base_version_seq > self.seq {
            return Err(EditorError::Reconciliation(format!(
                "base {} is ahead of server sequence {}",
                message.base_version_seq, self.seq
            )));
        }

        let mut ops = message.operation.clone();
        for concurrent in self.since(message.base_version_seq)? {
            let tie = Tie::between(
                &(message.user.as_str(), message.op_id),
                &(concurrent.user.as_str(), concurrent.op_id),
            );
            ops = transform_pair(&ops, &concurrent.operation, tie).0;
        }

        apply_all(&ops, &mut self.text)?;
        self.seq += 1;

        let sequenced = SequencedOperation {
            seq: self.seq,
            op_id: message.op_id,
            user: message.user.clone(),
            operation: ops,
        };
        self.history.push_back(sequenced.clone());
        while self.history.len() > self.history_limit {
            self.history.pop_front();
        }
        Ok(sequenced)
    }

    /// Everything sequenced after `seq`
    pub fn operations_since(&self, seq: u64) -> Result<Vec<SequencedOperation>> {
        Ok(self.since(seq)?.cloned().collect())
    }

    fn since(&self, seq: u64) -> Result<impl Iterator<Item = &SequencedOperation>> {
        let oldest = self.oldest_base();
        if seq < oldest {
            return Err(EditorError::HistoryTruncated {
                requested: seq,
                oldest,
            });
        }
        Ok(self.history.iter().filter(move |h| h.seq > seq))
    }
}
