use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Due-time ordered queue of card ids.
///
/// A sorted insert is enough at per-deck scale (hundreds to low
/// thousands of cards); ties keep insertion order.
#[derive(Debug, Default)]
pub struct DueQueue {
    entries: Vec<(DateTime<Utc>, i64)>,
}

impl DueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, due: DateTime<Utc>, card_id: i64) {
        let idx = self.entries.partition_point(|(d, _)| *d <= due);
        self.entries.insert(idx, (due, card_id));
    }

    /// Earliest entry without removing it
    pub fn peek(&self) -> Option<(DateTime<Utc>, i64)> {
        self.entries.first().copied()
    }

    /// Pop the earliest entry
    pub fn shift(&mut self) -> Option<(DateTime<Utc>, i64)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Remove a card wherever it sits; no-op if absent
    pub fn remove(&mut self, card_id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(_, id)| *id != card_id);
        self.entries.len() != before
    }

    pub fn contains(&self, card_id: i64) -> bool {
        self.entries.iter().any(|(_, id)| *id == card_id)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// FIFO queue of not-yet-introduced cards, ordered by creation time
#[derive(Debug, Default)]
pub struct NewQueue {
    entries: VecDeque<i64>,
}

impl NewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_back(&mut self, card_id: i64) {
        self.entries.push_back(card_id);
    }

    pub fn pop_front(&mut self) -> Option<i64> {
        self.entries.pop_front()
    }

    pub fn remove(&mut self, card_id: i64) -> bool {
        let before = self.entries.len();
        self.entries.retain(|id| *id != card_id);
        self.entries.len() != before
    }

    pub fn contains(&self, card_id: i64) -> bool {
        self.entries.contains(&card_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, minute, 0).unwrap()
    }

    #[test]
    fn test_due_queue_orders_by_time() {
        let mut q = DueQueue::new();
        q.push(at(30), 1);
        q.push(at(10), 2);
        q.push(at(20), 3);

        assert_eq!(q.shift(), Some((at(10), 2)));
        assert_eq!(q.shift(), Some((at(20), 3)));
        assert_eq!(q.shift(), Some((at(30), 1)));
        assert_eq!(q.shift(), None);
    }

    #[test]
    fn test_due_queue_ties_keep_insertion_order() {
        let mut q = DueQueue::new();
        q.push(at(10), 1);
        q.push(at(10), 2);
        q.push(at(10), 3);

        assert_eq!(q.shift(), Some((at(10), 1)));
        assert_eq!(q.shift(), Some((at(10), 2)));
        assert_eq!(q.shift(), Some((at(10), 3)));
    }

    #[test]
    fn test_due_queue_peek_does_not_remove() {
        let mut q = DueQueue::new();
        q.push(at(5), 9);
        assert_eq!(q.peek(), Some((at(5), 9)));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_due_queue_remove_is_idempotent() {
        let mut q = DueQueue::new();
        q.push(at(5), 1);
        q.push(at(6), 2);

        assert!(q.remove(1));
        assert!(!q.remove(1));
        assert!(!q.contains(1));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_new_queue_fifo() {
        let mut q = NewQueue::new();
        q.push_back(1);
        q.push_back(2);
        q.push_back(3);
        q.remove(2);

        assert_eq!(q.pop_front(), Some(1));
        assert_eq!(q.pop_front(), Some(3));
        assert_eq!(q.pop_front(), None);
    }
}
