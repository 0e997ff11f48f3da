/// Cursor clocks
///
/// Caret broadcasts are last-writer-wins per user. One Lamport counter
/// stamps our own updates and folds in every stamp received, so a client
/// that reloads and starts over still outruns the stamps its previous
/// instance left with the others. Alongside it, the newest stamp applied
/// per sender; anything at or below it is a replay or arrived late.
use super::messages::CursorUpdate;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct CursorClock {
    counter: u64,
    latest: HashMap<String, u64>,
}

impl CursorClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp the next caret broadcast for `user`
    pub fn stamp(&mut self, user: &str, position: Option<usize>) -> CursorUpdate {
        self.counter += 1;
        self.latest.insert(user.to_string(), self.counter);
        CursorUpdate {
            user_id: user.to_string(),
            position,
            clock: self.counter,
        }
    }

    /// Record `update` if it is newer than anything applied from its sender
    pub fn accept(&mut self, update: &CursorUpdate) -> bool {
        self.counter = self.counter.max(update.clock);
        let latest = self.latest.entry(update.user_id.clone()).or_insert(0);
        if update.clock <= *latest {
            return false;
        }
        *latest = update.clock;
        true
    }

    /// Newest stamp applied for `user`
    pub fn latest(&self, user: &str) -> Option<u64> {
        self.latest.get(user).copied()
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
    fn test_stamps_increase() {
        let mut clock = CursorClock::new();
        assert_eq!(clock.stamp("alice", Some(0)).clock, 1);
        assert_eq!(clock.stamp("alice", None).clock, 2);
        assert_eq!(clock.latest("alice"), Some(2));
    }

    #[test]
    fn test_late_update_rejected() {
        let mut clock = CursorClock::new();
        assert!(clock.accept(&cursor("bob", 4, 2)));
        assert!(!clock.accept(&cursor("bob", 1, 1)));
        assert!(!clock.accept(&cursor("bob", 4, 2)));
        assert!(clock.accept(&cursor("carol", 0, 1)));
        assert_eq!(clock.latest("bob"), Some(2));
    }

    #[test]
    fn test_reloaded_sender_outruns_old_stamps() {
        // bob has seen alice's old instance up to 30
        let mut bob = CursorClock::new();
        assert!(bob.accept(&cursor("alice", 3, 30)));

        // alice reloads and hears from bob before moving her caret
        let mut alice = CursorClock::new();
        let from_bob = bob.stamp("bob", Some(7));
        assert!(alice.accept(&from_bob));

        let update = alice.stamp("alice", Some(1));
        assert!(update.clock > 30);
        assert!(bob.accept(&update));
    }
}
