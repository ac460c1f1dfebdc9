//! Tracking of raw insert-mode input.
//!
//! A text change event does not say what caused it: the user typing, the
//! popup inserting the selected word, or a plugin editing the buffer. The
//! only available signal is whether a key press was seen *recently*, so the
//! tracker keeps the last `InsertCharPre` character with its timestamp and
//! treats it as fresh for a short window.

use std::time::{Duration, Instant};

const FRESH_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastInsert {
    pub character: char,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct InsertTracker {
    last_insert: Option<LastInsert>,
    insert_char_at: Option<Instant>,
    insert_leave_at: Option<Instant>,
}

impl InsertTracker {
    pub fn new() -> InsertTracker {
        InsertTracker::default()
    }

    pub fn record_char(&mut self, character: char) {
        self.record_char_at(character, Instant::now());
    }

    fn record_char_at(&mut self, character: char, at: Instant) {
        self.last_insert = Some(LastInsert { character, at });
        self.insert_char_at = Some(at);
    }

    pub fn record_leave(&mut self) {
        self.insert_leave_at = Some(Instant::now());
    }

    /// A text change consumes the pending insert so the same key press is
    /// never attributed to two changes.
    pub fn clear_last_insert(&mut self) {
        self.last_insert = None;
    }

    /// The last typed character, if it is still fresh.
    pub fn latest_insert(&self) -> Option<LastInsert> {
        self.latest_insert_at(Instant::now())
    }

    fn latest_insert_at(&self, now: Instant) -> Option<LastInsert> {
        self.last_insert
            .filter(|insert| now.duration_since(insert.at) <= FRESH_WINDOW)
    }

    pub fn latest_insert_char(&self) -> Option<char> {
        self.latest_insert().map(|insert| insert.character)
    }

    /// Snapshot of the input timestamps, captured before a suspension point
    /// and compared afterwards; any mismatch means the user typed or left
    /// insert mode in between and the continuation is stale.
    pub fn witness(&self) -> InsertWitness {
        InsertWitness {
            char_at: self.insert_char_at,
            leave_at: self.insert_leave_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertWitness {
    char_at: Option<Instant>,
    leave_at: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_insert_within_window() {
        let mut tracker = InsertTracker::new();
        tracker.record_char('f');
        assert_eq!(tracker.latest_insert_char(), Some('f'));
    }

    #[test]
    fn stale_insert_expires() {
        let mut tracker = InsertTracker::new();
        let old = Instant::now()
            .checked_sub(Duration::from_millis(600))
            .expect("clock predates test");
        tracker.record_char_at('f', old);
        assert_eq!(tracker.latest_insert_at(Instant::now()), None);
    }

    #[test]
    fn boundary_is_inclusive() {
        let mut tracker = InsertTracker::new();
        let now = Instant::now();
        let at = now.checked_sub(FRESH_WINDOW).expect("clock predates test");
        tracker.record_char_at('x', at);
        assert!(tracker.latest_insert_at(now).is_some());
    }

    #[test]
    fn text_change_consumes_the_insert() {
        let mut tracker = InsertTracker::new();
        tracker.record_char('a');
        tracker.clear_last_insert();
        assert_eq!(tracker.latest_insert_char(), None);
        // the witness still remembers that a key was pressed
        assert_ne!(tracker.witness(), InsertTracker::new().witness());
    }

    #[test]
    fn witness_moves_with_input() {
        let mut tracker = InsertTracker::new();
        let before = tracker.witness();
        tracker.record_char('a');
        let after_char = tracker.witness();
        assert_ne!(before, after_char);
        tracker.record_leave();
        assert_ne!(after_char, tracker.witness());
    }
}
