//! CollaborationCoordinator: client side of the sequencing protocol
//!
//! The server assigns every operation a sequence number. This client keeps
//! at most one local operation in flight; further local edits queue behind
//! it. Remote operations are applied in strict sequence order, each one
//! transformed against every local operation the server has not
//! acknowledged yet. Our own operation coming back sequenced is the
//! acknowledgement.
//!
//! The coordinator never touches the text. Callers feed it server messages
//! and local edits, then apply the returned remote edits and send the
//! returned outbound messages.

use super::messages::{ClientMessage, CursorUpdate, OperationMessage, SequencedOperation, ServerMessage};
use super::clock::CursorClock;
use super::session::CollaborativeSession;
use crate::config::CollaborationConfig;
use crate::editor::{transform_pair, Operation, Tie};
use crate::error::{EditorError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncState {
    /// Not in a session
    Offline,
    Live,
    /// Waiting for `operations_since` after a gap or reconnect
    CatchingUp,
    /// Reconciliation failed; a full resync is required
    Degraded,
}

#[derive(Debug, Clone)]
struct PendingOp {
    op_id: Uuid,
    ops: Vec<Operation>,
}

/// A remote operation ready for local application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEdit {
    pub seq: u64,
    pub user: String,
    /// Transformed against all unacknowledged local operations
    pub ops: Vec<Operation>,
}

/// Work produced by feeding the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reception {
    pub remote: Vec<RemoteEdit>,
    pub outbound: Vec<ClientMessage>,
    /// Sequence numbers of our own operations acknowledged
    pub acked: Vec<u64>,
    /// The inbound buffer overflowed; request `operations_since(last_acked)`
    pub needs_catch_up: bool,
}

#[derive(Debug, Clone)]
pub struct CollaborationCoordinator {
    file_id: String,
    user: String,
    state: SyncState,
    session: Option<CollaborativeSession>,
    /// Highest server sequence number applied locally
    last_acked: u64,
    /// Local operations not yet acknowledged; the front one may be in flight
    pending: VecDeque<PendingOp>,
    in_flight: bool,
    /// Remote operations that arrived ahead of their predecessor
    buffered: BTreeMap<u64, SequencedOperation>,
    max_buffered: usize,
    clock: CursorClock,
}

impl CollaborationCoordinator {
    pub fn new(file_id: impl Into<String>, user: impl Into<String>, config: &CollaborationConfig) -> Self {
        Self {
            file_id: file_id.into(),
            user: user.into(),
            state: SyncState::Offline,
            session: None,
            last_acked: 0,
            pending: VecDeque::new(),
            in_flight: false,
            buffered: BTreeMap::new(),
            max_buffered: config.max_buffered_ops,
            clock: CursorClock::new(),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn is_collaborating(&self) -> bool {
        self.state != SyncState::Offline
    }

    pub fn session(&self) -> Option<&CollaborativeSession> {
        self.session.as_ref()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn last_acked(&self) -> u64 {
        self.last_acked
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn buffered_count(&self) -> usize {
        self.buffered.len()
    }

    /// Join the session for a document at server sequence `seq`
    pub fn start(&mut self, seq: u64) -> Vec<ClientMessage> {
        if self.is_collaborating() {
            return Vec::new();
        }
        self.session = Some(CollaborativeSession::open(&self.user));
        self.last_acked = seq;
        self.state = SyncState::Live;
        tracing::info!(file = %self.file_id, user = %self.user, seq, "collaboration started");
        vec![ClientMessage::Join {
            user: self.user.clone(),
        }]
    }

    /// Leave immediately; unacknowledged operations are dropped
    pub fn stop(&mut self) -> Vec<ClientMessage> {
        if !self.is_collaborating() {
            return Vec::new();
        }
        self.session = None;
        self.pending.clear();
        self.buffered.clear();
        self.in_flight = false;
        self.state = SyncState::Offline;
        tracing::info!(file = %self.file_id, user = %self.user, "collaboration stopped");
        vec![ClientMessage::Leave {
            user: self.user.clone(),
        }]
    }

    /// Queue an applied local edit for sequencing
    pub fn submit(&mut self, ops: &[Operation]) -> Option<ClientMessage> {
        if !self.is_collaborating() || ops.is_empty() {
            return None;
        }
        if let Some(session) = self.session.as_mut() {
            session.shift_cursors(ops);
        }
        self.pending.push_back(PendingOp {
            op_id: Uuid::new_v4(),
            ops: ops.to_vec(),
        });
        self.flush()
    }

    /// Send the front pending operation if nothing is in flight
    pub fn flush(&mut self) -> Option<ClientMessage> {
        if self.in_flight || self.state != SyncState::Live {
            return None;
        }
        let front = self.pending.front()?;
        self.in_flight = true;
        Some(ClientMessage::Operation(OperationMessage {
            op_id: front.op_id,
            base_version_seq: self.last_acked,
            user: self.user.clone(),
            operation: front.ops.clone(),
        }))
    }

    pub fn receive(&mut self, message: ServerMessage) -> Result<Reception> {
        if !self.is_collaborating() {
            return Err(EditorError::NotCollaborating);
        }

        let mut reception = Reception::default();
        match message {
            ServerMessage::Sequenced(op) => self.sequenced(op, &mut reception),
            ServerMessage::Cursor(update) => {
                self.receive_cursor(&update);
            }
            ServerMessage::Joined { user } => {
                if let Some(session) = self.session.as_mut() {
                    session.join(&user);
                }
            }
            ServerMessage::Left { user } => {
                if let Some(session) = self.session.as_mut() {
                    session.leave(&user);
                }
            }
        }
        Ok(reception)
    }

    /// Apply a remote caret update; returns whether it was fresh
    pub fn receive_cursor(&mut self, update: &CursorUpdate) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if update.user_id == self.user || !session.is_active(&update.user_id) {
            return false;
        }
        if !self.clock.accept(update) {
            tracing::trace!(user = %update.user_id, clock = update.clock, "stale cursor dropped");
            return false;
        }
        session.apply_cursor(update)
    }

    /// Stamp and record our caret; returns the broadcast to send
    pub fn update_cursor(&mut self, position: Option<usize>) -> Option<ClientMessage> {
        let session = self.session.as_mut()?;
        let update = self.clock.stamp(&self.user, position);
        session.apply_cursor(&update);
        Some(ClientMessage::Cursor(update))
    }

    /// Enter catch-up; returns the sequence number to fetch from
    ///
    /// The in-flight operation is considered lost until proven otherwise:
    /// if the server did sequence it, it shows up in the catch-up batch.
    pub fn begin_catch_up(&mut self) -> Result<u64> {
        if !self.is_collaborating() {
            return Err(EditorError::NotCollaborating);
        }
        if self.state == SyncState::Degraded {
            return Err(EditorError::Reconciliation(
                "session degraded, resync required".into(),
            ));
        }
        self.state = SyncState::CatchingUp;
        self.in_flight = false;
        tracing::debug!(file = %self.file_id, since = self.last_acked, "catching up");
        Ok(self.last_acked)
    }

    /// Integrate a catch-up batch and resume live operation
    ///
    /// Ignored unless still catching up: a stop or a degrade while the batch
    /// was being fetched wins.
    pub fn finish_catch_up(&mut self, ops: Vec<SequencedOperation>) -> Reception {
        let mut reception = Reception::default();
        if self.state != SyncState::CatchingUp {
            tracing::debug!(file = %self.file_id, state = ?self.state, "stale catch-up batch dropped");
            return reception;
        }
        for op in ops {
            self.sequenced(op, &mut reception);
        }
        self.state = SyncState::Live;
        reception.needs_catch_up = false;
        reception.outbound.extend(self.flush());
        reception
    }

    pub fn mark_degraded(&mut self, reason: &str) {
        if self.is_collaborating() {
            tracing::warn!(file = %self.file_id, reason, "collaboration degraded");
            self.state = SyncState::Degraded;
        }
    }

    /// Resume after the local text was replaced by the server copy at `seq`
    pub fn resynced(&mut self, seq: u64) {
        self.pending.clear();
        self.buffered.clear();
        self.in_flight = false;
        self.last_acked = seq;
        if self.is_collaborating() {
            self.state = SyncState::Live;
        }
        tracing::info!(file = %self.file_id, seq, "resynchronized");
    }

    fn sequenced(&mut self, op: SequencedOperation, reception: &mut Reception) {
        if self.state == SyncState::Degraded {
            return;
        }
        if op.seq <= self.last_acked || self.buffered.contains_key(&op.seq) {
            tracing::debug!(file = %self.file_id, seq = op.seq, "duplicate operation dropped");
            return;
        }

        self.buffered.insert(op.seq, op);
        while let Some(next) = self.buffered.remove(&(self.last_acked + 1)) {
            self.integrate(next, reception);
        }

        if self.buffered.len() > self.max_buffered && self.state == SyncState::Live {
            tracing::warn!(
                file = %self.file_id,
                buffered = self.buffered.len(),
                "inbound gap too large"
            );
            reception.needs_catch_up = true;
        }
    }

    fn integrate(&mut self, op: SequencedOperation, reception: &mut Reception) {
        self.last_acked = op.seq;
        reception.outbound.push(ClientMessage::Ack { seq: op.seq });

        if self.pending.front().map(|p| p.op_id) == Some(op.op_id) {
            self.pending.pop_front();
            self.in_flight = false;
            reception.acked.push(op.seq);
            reception.outbound.extend(self.flush());
            return;
        }

        let mut remote = op.operation;
        for pending in self.pending.iter_mut() {
            let tie = Tie::between(
                &(self.user.as_str(), pending.op_id),
                &(op.user.as_str(), op.op_id),
            );
            let (local, rest) = transform_pair(&pending.ops, &remote, tie);
            pending.ops = local;
            remote = rest;
        }

        if let Some(session) = self.session.as_mut() {
            session.shift_cursors(&remote);
        }
        reception.remote.push(RemoteEdit {
            seq: op.seq,
            user: op.user,
            ops: remote,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::DocumentText;

    fn coordinator(user: &str) -> CollaborationCoordinator {
        let mut c = CollaborationCoordinator::new("file-1", user, &CollaborationConfig::default());
        c.start(0);
        c
    }

    fn sequenced(seq: u64, user: &str, ops: Vec<Operation>) -> ServerMessage {
        ServerMessage::Sequenced(SequencedOperation {
            seq,
            op_id: Uuid::new_v4(),
            user: user.into(),
            operation: ops,
        })
    }

    fn sent_op(message: Option<ClientMessage>) -> OperationMessage {
        match message {
            Some(ClientMessage::Operation(op)) => op,
            other => panic!("expected operation message, got {:?}", other),
        }
    }

    #[test]
    fn test_start_and_stop() {
        let mut c = CollaborationCoordinator::new("file-1", "alice", &CollaborationConfig::default());
        assert!(!c.is_collaborating());
        assert!(c.submit(&[Operation::insert(0, "x")]).is_none());

        assert_eq!(c.start(3), vec![ClientMessage::Join { user: "alice".into() }]);
        assert!(c.start(3).is_empty());
        assert_eq!(c.last_acked(), 3);
        assert_eq!(c.session().unwrap().active_count(), 1);

        assert_eq!(c.stop(), vec![ClientMessage::Leave { user: "alice".into() }]);
        assert!(c.session().is_none());
        assert!(matches!(
            c.receive(ServerMessage::Joined { user: "bob".into() }),
            Err(EditorError::NotCollaborating)
        ));
    }

    #[test]
    fn test_one_operation_in_flight() {
        let mut c = coordinator("alice");
        let first = sent_op(c.submit(&[Operation::insert(0, "a")]));
        assert_eq!(first.base_version_seq, 0);
        assert!(c.submit(&[Operation::insert(1, "b")]).is_none());
        assert_eq!(c.pending_count(), 2);

        let echo = ServerMessage::Sequenced(SequencedOperation {
            seq: 1,
            op_id: first.op_id,
            user: "alice".into(),
            operation: first.operation,
        });
        let reception = c.receive(echo).unwrap();

        assert_eq!(reception.acked, vec![1]);
        assert!(reception.remote.is_empty());
        assert_eq!(reception.outbound[0], ClientMessage::Ack { seq: 1 });
        match &reception.outbound[1] {
            ClientMessage::Operation(next) => {
                assert_eq!(next.base_version_seq, 1);
                assert_eq!(next.operation, vec![Operation::insert(1, "b")]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_remote_transformed_against_pending() {
        // A = insert "X" at 2 (local, unacknowledged), B = delete [0,3) (remote)
        let mut c = coordinator("alice");
        let mut text = DocumentText::from_text("abcdef");
        let local = Operation::insert(2, "X");
        local.apply(&mut text).unwrap();
        c.submit(&[local]);

        let reception = c
            .receive(sequenced(1, "bob", vec![Operation::delete(0..3)]))
            .unwrap();
        for op in &reception.remote[0].ops {
            op.apply(&mut text).unwrap();
        }

        assert_eq!(text.to_string(), "Xdef");
    }

    #[test]
    fn test_out_of_order_buffered() {
        let mut c = coordinator("alice");

        let early = c
            .receive(sequenced(2, "bob", vec![Operation::insert(1, "b")]))
            .unwrap();
        assert!(early.remote.is_empty());
        assert_eq!(c.buffered_count(), 1);

        let reception = c
            .receive(sequenced(1, "bob", vec![Operation::insert(0, "a")]))
            .unwrap();
        let seqs: Vec<u64> = reception.remote.iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![1, 2]);
        assert_eq!(c.last_acked(), 2);
        assert_eq!(c.buffered_count(), 0);
    }

    #[test]
    fn test_duplicates_dropped() {
        let mut c = coordinator("alice");
        c.receive(sequenced(1, "bob", vec![Operation::insert(0, "a")]))
            .unwrap();

        let again = c
            .receive(sequenced(1, "bob", vec![Operation::insert(0, "a")]))
            .unwrap();
        assert_eq!(again, Reception::default());
    }

    #[test]
    fn test_buffer_overflow_requests_catch_up() {
        let config = CollaborationConfig {
            max_buffered_ops: 2,
            ..CollaborationConfig::default()
        };
        let mut c = CollaborationCoordinator::new("file-1", "alice", &config);
        c.start(0);

        let mut needs = false;
        for seq in 2..=4 {
            needs = c
                .receive(sequenced(seq, "bob", vec![Operation::insert(0, "x")]))
                .unwrap()
                .needs_catch_up;
        }
        assert!(needs);

        assert_eq!(c.begin_catch_up().unwrap(), 0);
        let reception = c.finish_catch_up(vec![SequencedOperation {
            seq: 1,
            op_id: Uuid::new_v4(),
            user: "bob".into(),
            operation: vec![Operation::insert(0, "y")],
        }]);

        assert_eq!(reception.remote.len(), 4);
        assert_eq!(c.state(), SyncState::Live);
        assert_eq!(c.last_acked(), 4);
    }

    #[test]
    fn test_stop_during_catch_up_stays_offline() {
        let mut c = coordinator("alice");
        c.begin_catch_up().unwrap();
        assert_eq!(c.stop().len(), 1);

        let reception = c.finish_catch_up(vec![SequencedOperation {
            seq: 1,
            op_id: Uuid::new_v4(),
            user: "bob".into(),
            operation: vec![Operation::insert(0, "y")],
        }]);

        assert!(reception.remote.is_empty());
        assert!(reception.outbound.is_empty());
        assert_eq!(c.state(), SyncState::Offline);
        assert!(c.session().is_none());
        assert!(c.submit(&[Operation::insert(0, "a")]).is_none());
    }

    #[test]
    fn test_degrade_during_catch_up_stays_degraded() {
        let mut c = coordinator("alice");
        c.submit(&[Operation::insert(0, "a")]);
        c.begin_catch_up().unwrap();
        c.mark_degraded("snapshot mismatch");

        let reception = c.finish_catch_up(Vec::new());
        assert!(reception.outbound.is_empty());
        assert_eq!(c.state(), SyncState::Degraded);
        assert!(matches!(
            c.begin_catch_up(),
            Err(EditorError::Reconciliation(_))
        ));

        c.resynced(3);
        assert_eq!(c.state(), SyncState::Live);
    }

    #[test]
    fn test_catch_up_recognizes_own_operation() {
        let mut c = coordinator("alice");
        let sent = sent_op(c.submit(&[Operation::insert(0, "a")]));

        c.begin_catch_up().unwrap();
        let reception = c.finish_catch_up(vec![SequencedOperation {
            seq: 1,
            op_id: sent.op_id,
            user: "alice".into(),
            operation: sent.operation,
        }]);

        assert_eq!(reception.acked, vec![1]);
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn test_catch_up_resends_lost_operation() {
        let mut c = coordinator("alice");
        let sent = sent_op(c.submit(&[Operation::insert(0, "a")]));

        c.begin_catch_up().unwrap();
        let reception = c.finish_catch_up(vec![SequencedOperation {
            seq: 1,
            op_id: Uuid::new_v4(),
            user: "bob".into(),
            operation: vec![Operation::insert(0, "zz")],
        }]);

        let resent = reception
            .outbound
            .iter()
            .find_map(|m| match m {
                ClientMessage::Operation(op) => Some(op.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(resent.op_id, sent.op_id);
        assert_eq!(resent.base_version_seq, 1);
    }

    #[test]
    fn test_degraded_ignores_sequenced_until_resync() {
        let mut c = coordinator("alice");
        c.submit(&[Operation::insert(0, "a")]);
        c.mark_degraded("apply failed");

        let reception = c
            .receive(sequenced(1, "bob", vec![Operation::insert(0, "b")]))
            .unwrap();
        assert!(reception.remote.is_empty());

        c.resynced(7);
        assert_eq!(c.state(), SyncState::Live);
        assert_eq!(c.last_acked(), 7);
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn test_cursor_messages() {
        let mut c = coordinator("alice");
        c.receive(ServerMessage::Joined { user: "bob".into() }).unwrap();

        let update = CursorUpdate {
            user_id: "bob".into(),
            position: Some(2),
            clock: 4,
        };
        c.receive(ServerMessage::Cursor(update)).unwrap();

        match c.update_cursor(Some(1)) {
            Some(ClientMessage::Cursor(own)) => assert!(own.clock > 4),
            other => panic!("unexpected {:?}", other),
        }

        c.receive(sequenced(1, "bob", vec![Operation::insert(0, "xyz")]))
            .unwrap();
        let session = c.session().unwrap();
        assert_eq!(session.participant("bob").unwrap().cursor, Some(5));
        assert_eq!(session.participant("alice").unwrap().cursor, Some(4));

        let late = CursorUpdate {
            user_id: "bob".into(),
            position: Some(0),
            clock: 3,
        };
        assert!(!c.receive_cursor(&late));
        assert_eq!(c.session().unwrap().participant("bob").unwrap().cursor, Some(5));
    }
}
