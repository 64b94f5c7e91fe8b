//! Replay cursors over recorded sequences.
//!
//! A cursor owns a reversed working copy of one recorded sequence so that
//! `pop` yields the chronologically next item in O(1). The installed log is
//! never mutated by replay.

use crate::entry::Entry;
use crate::log::Log;
use crate::xhr::XhrRecord;
use reprise_core::{EngineError, EngineResult, Timestamp};

/// Reversed working copy of a recorded sequence
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor<T> {
    items: Vec<T>,
}

impl<T> Cursor<T> {
    /// Build a cursor from items in chronological order
    #[must_use]
    pub fn from_chronological(mut items: Vec<T>) -> Self {
        items.reverse();
        Self { items }
    }

    /// Next item in chronological order
    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Next item, or `Exhausted` naming the stream
    ///
    /// # Errors
    ///
    /// Returns error if no item is left
    pub fn pop_or_exhausted(&mut self, stream: &str) -> EngineResult<T> {
        self.items.pop().ok_or_else(|| EngineError::exhausted(stream))
    }

    /// Look at the next item without consuming it
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    /// Items not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.items.len()
    }

    /// Whether every item has been consumed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Cursor<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Clone> Cursor<T> {
    /// Build a cursor over a copy of `items`
    #[must_use]
    pub fn copied_from(items: &[T]) -> Self {
        Self {
            items: items.iter().rev().cloned().collect(),
        }
    }
}

/// Working copies consumed by one replay
#[derive(Debug, Clone, Default)]
pub struct ReplayLog {
    /// Recorded time reads
    pub dates: Cursor<Timestamp>,
    /// Recorded random draws
    pub random: Cursor<f64>,
    /// Recorded events, consumed by the scheduler
    pub events: Cursor<Entry>,
    /// Recorded request instances in allocation order
    pub xhr: Cursor<XhrRecord>,
}

impl ReplayLog {
    /// Build working copies of every replayable sequence
    #[must_use]
    pub fn from_log(log: &Log) -> Self {
        Self {
            dates: Cursor::copied_from(&log.dates),
            random: Cursor::copied_from(&log.random),
            events: Cursor::copied_from(&log.events),
            xhr: Cursor::copied_from(&log.xhr.instances),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pop_is_chronological() {
        let mut cursor = Cursor::from_chronological(vec![1, 2, 3]);
        assert_eq!(cursor.peek(), Some(&1));
        assert_eq!(cursor.pop(), Some(1));
        assert_eq!(cursor.pop(), Some(2));
        assert_eq!(cursor.remaining(), 1);
        assert_eq!(cursor.pop(), Some(3));
        assert!(cursor.is_empty());
        assert_eq!(cursor.pop(), None);
    }

    #[test]
    fn test_pop_or_exhausted() {
        let mut cursor: Cursor<f64> = Cursor::default();
        let err = cursor.pop_or_exhausted("random").unwrap_err();
        assert_eq!(err, EngineError::exhausted("random"));
    }

    #[test]
    fn test_replay_log_leaves_source_alone() {
        let mut log = Log::new();
        log.random.extend([0.1, 0.2]);

        let mut replay = ReplayLog::from_log(&log);
        assert_eq!(replay.random.pop(), Some(0.1));
        assert_eq!(log.random, vec![0.1, 0.2]);
    }

    proptest! {
        #[test]
        fn prop_cursor_yields_in_order(items in proptest::collection::vec(any::<u32>(), 0..64)) {
            let mut cursor = Cursor::copied_from(&items);
            let mut drained = Vec::new();
            while let Some(item) = cursor.pop() {
                drained.push(item);
            }
            prop_assert_eq!(drained, items);
        }
    }
}
