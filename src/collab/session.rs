/// Collaborative session membership
///
/// Participants live in an arena keyed by user id and are only mutated
/// through the session's handlers. A session with no active participant is
/// over; the coordinator drops it.
use super::messages::CursorUpdate;
use crate::editor::{transform_position, Operation};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user: String,
    pub cursor: Option<usize>,
    pub is_active: bool,
    pub joined: DateTime<Utc>,
}

impl Participant {
    fn new(user: &str) -> Self {
        Self {
            user: user.to_string(),
            cursor: None,
            is_active: true,
            joined: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollaborativeSession {
    id: Uuid,
    participants: HashMap<String, Participant>,
}

impl CollaborativeSession {
    /// Open a session with its first participant
    pub fn open(user: &str) -> Self {
        let mut session = Self {
            id: Uuid::new_v4(),
            participants: HashMap::new(),
        };
        session.join(user);
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Mark `user` active; returns false if already active
    pub fn join(&mut self, user: &str) -> bool {
        let participant = self
            .participants
            .entry(user.to_string())
            .or_insert_with(|| Participant {
                is_active: false,
                ..Participant::new(user)
            });

        if participant.is_active {
            return false;
        }
        participant.is_active = true;
        participant.joined = Utc::now();
        tracing::debug!(session = %self.id, user, "participant joined");
        true
    }

    /// Mark `user` inactive; returns false if they were not active
    pub fn leave(&mut self, user: &str) -> bool {
        match self.participants.get_mut(user) {
            Some(p) if p.is_active => {
                p.is_active = false;
                p.cursor = None;
                tracing::debug!(session = %self.id, user, "participant left");
                true
            }
            _ => false,
        }
    }

    /// Move an active participant's caret; the caller checks freshness
    pub fn apply_cursor(&mut self, update: &CursorUpdate) -> bool {
        match self.participants.get_mut(&update.user_id) {
            Some(p) if p.is_active => {
                p.cursor = update.position;
                true
            }
            _ => false,
        }
    }

    pub fn is_active(&self, user: &str) -> bool {
        self.participants.get(user).is_some_and(|p| p.is_active)
    }

    /// Keep carets on the same text after an edit
    pub fn shift_cursors(&mut self, applied: &[Operation]) {
        for participant in self.participants.values_mut() {
            if let Some(pos) = participant.cursor {
                participant.cursor = Some(
                    applied
                        .iter()
                        .fold(pos, |pos, op| transform_position(pos, op)),
                );
            }
        }
    }

    pub fn participant(&self, user: &str) -> Option<&Participant> {
        self.participants.get(user)
    }

    /// Active participants ordered by user id
    pub fn active_participants(&self) -> Vec<&Participant> {
        let mut active: Vec<_> = self.participants.values().filter(|p| p.is_active).collect();
        active.sort_by(|a, b| a.user.cmp(&b.user));
        active
    }

    pub fn active_count(&self) -> usize {
        self.participants.values().filter(|p| p.is_active).count()
    }

    pub fn is_empty(&self) -> bool {
        self.active_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(user: &str, position: usize, clock: u64) -> CursorUpdate {
        CursorUpdate {
            user_id: user.into(),
            position: Some(position),
            clock,
        }
    }

    #[test]
    fn test_join_and_leave() {
        let mut session = CollaborativeSession::open("alice");
        assert!(session.join("bob"));
        assert!(!session.join("bob"));
        assert_eq!(session.active_count(), 2);

        assert!(session.leave("alice"));
        assert!(!session.leave("alice"));
        assert!(!session.is_empty());

        assert!(session.leave("bob"));
        assert!(session.is_empty());
    }

    #[test]
    fn test_cursor_needs_active_participant() {
        let mut session = CollaborativeSession::open("alice");
        session.join("bob");

        assert!(session.apply_cursor(&cursor("bob", 4, 2)));
        assert_eq!(session.participant("bob").unwrap().cursor, Some(4));
        assert!(!session.apply_cursor(&cursor("carol", 0, 1)));

        session.leave("bob");
        assert!(!session.is_active("bob"));
        assert!(!session.apply_cursor(&cursor("bob", 1, 3)));
        assert_eq!(session.participant("bob").unwrap().cursor, None);
    }

    #[test]
    fn test_cursors_follow_edits() {
        let mut session = CollaborativeSession::open("alice");
        session.join("bob");
        session.apply_cursor(&cursor("bob", 5, 1));

        session.shift_cursors(&[Operation::insert(0, "abc")]);
        assert_eq!(session.participant("bob").unwrap().cursor, Some(8));

        session.shift_cursors(&[Operation::delete(2..10)]);
        assert_eq!(session.participant("bob").unwrap().cursor, Some(2));
    }
}
