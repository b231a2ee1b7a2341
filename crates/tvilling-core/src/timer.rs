//! Keyed virtual-time timer queue.
//!
//! Every pending timer is identified by a key, and a key has at most one
//! pending deadline. Scheduling a key that is already pending replaces the
//! old deadline, which is how a new zone change supersedes the recovery of
//! the previous one. Cancelling removes the entry outright, so a cancelled
//! timer can never be returned by [`TimerQueue::pop_due`].
//!
//! # Invariants
//!
//! - `by_key` and `deadlines` always hold the same set of timers
//! - Timers with equal deadlines fire in scheduling order

use std::{
    collections::{BTreeMap, HashMap},
    hash::Hash,
};

/// Pending timers ordered by virtual deadline.
#[derive(Debug, Clone)]
pub struct TimerQueue<K> {
    /// `(deadline_ms, sequence)` to key.
    deadlines: BTreeMap<(u64, u64), K>,
    /// Key to its `(deadline_ms, sequence)`.
    by_key: HashMap<K, (u64, u64)>,
    /// Tie-breaker for equal deadlines.
    next_seq: u64,
}

impl<K> Default for TimerQueue<K> {
    fn default() -> Self {
        Self { deadlines: BTreeMap::new(), by_key: HashMap::new(), next_seq: 0 }
    }
}

impl<K: Copy + Eq + Hash> TimerQueue<K> {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `deadline_ms`.
    ///
    /// Returns `true` if a pending timer for the same key was replaced.
    pub fn schedule(&mut self, key: K, deadline_ms: u64) -> bool {
        let replaced = self.cancel(key);

        let slot = (deadline_ms, self.next_seq);
        self.next_seq += 1;
        self.deadlines.insert(slot, key);
        self.by_key.insert(key, slot);

        replaced
    }

    /// Cancel the pending timer for `key`.
    ///
    /// Returns `true` if one was pending.
    pub fn cancel(&mut self, key: K) -> bool {
        match self.by_key.remove(&key) {
            Some(slot) => {
                self.deadlines.remove(&slot);
                true
            },
            None => false,
        }
    }

    /// Cancel every pending timer whose key matches `predicate`.
    ///
    /// Returns how many were cancelled.
    pub fn cancel_where(&mut self, predicate: impl Fn(&K) -> bool) -> usize {
        let doomed: Vec<K> = self.by_key.keys().filter(|k| predicate(k)).copied().collect();
        for key in &doomed {
            self.cancel(*key);
        }
        doomed.len()
    }

    /// Deadline of the pending timer for `key`.
    pub fn deadline(&self, key: K) -> Option<u64> {
        self.by_key.get(&key).map(|(deadline, _)| *deadline)
    }

    /// Whether `key` has a pending timer.
    pub fn is_pending(&self, key: K) -> bool {
        self.by_key.contains_key(&key)
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<u64> {
        self.deadlines.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at or before `now_ms`.
    pub fn pop_due(&mut self, now_ms: u64) -> Option<(u64, K)> {
        let (&slot, _) =
            self.deadlines.iter().next().filter(|((deadline, _), _)| *deadline <= now_ms)?;
        let key = self.deadlines.remove(&slot)?;
        self.by_key.remove(&key);
        Some((slot.0, key))
    }

    /// Number of pending timers.
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    /// Whether no timer is pending.
    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        A,
        B,
        C,
    }

    #[test]
    fn fires_in_deadline_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Key::A, 300);
        timers.schedule(Key::B, 100);
        timers.schedule(Key::C, 200);

        assert_eq!(timers.pop_due(1_000), Some((100, Key::B)));
        assert_eq!(timers.pop_due(1_000), Some((200, Key::C)));
        assert_eq!(timers.pop_due(1_000), Some((300, Key::A)));
        assert_eq!(timers.pop_due(1_000), None);
    }

    #[test]
    fn nothing_fires_early() {
        let mut timers = TimerQueue::new();
        timers.schedule(Key::A, 500);
        assert_eq!(timers.pop_due(499), None);
        assert_eq!(timers.pop_due(500), Some((500, Key::A)));
    }

    #[test]
    fn rescheduling_replaces_pending_deadline() {
        let mut timers = TimerQueue::new();
        assert!(!timers.schedule(Key::A, 100));
        assert!(timers.schedule(Key::A, 900));

        assert_eq!(timers.len(), 1);
        assert_eq!(timers.pop_due(500), None, "old deadline must not fire");
        assert_eq!(timers.pop_due(900), Some((900, Key::A)));
    }

    #[test]
    fn cancelled_timer_never_fires() {
        let mut timers = TimerQueue::new();
        timers.schedule(Key::A, 10);
        assert!(timers.cancel(Key::A));
        assert!(!timers.cancel(Key::A));
        assert_eq!(timers.pop_due(u64::MAX), None);
        assert!(timers.is_empty());
    }

    #[test]
    fn cancel_where_only_hits_matching_keys() {
        let mut timers = TimerQueue::new();
        timers.schedule(Key::A, 10);
        timers.schedule(Key::B, 20);
        timers.schedule(Key::C, 30);

        assert_eq!(timers.cancel_where(|k| *k != Key::B), 2);
        assert!(timers.is_pending(Key::B));
        assert_eq!(timers.next_deadline(), Some(20));
    }

    #[test]
    fn equal_deadlines_fire_in_schedule_order() {
        let mut timers = TimerQueue::new();
        timers.schedule(Key::C, 50);
        timers.schedule(Key::A, 50);
        assert_eq!(timers.pop_due(50), Some((50, Key::C)));
        assert_eq!(timers.pop_due(50), Some((50, Key::A)));
    }

    proptest! {
        #[test]
        fn prop_indexes_stay_consistent(
            ops in prop::collection::vec((0u8..3, 0u64..1_000, any::<bool>()), 0..64)
        ) {
            let mut timers = TimerQueue::new();
            for (k, deadline, cancel) in ops {
                let key = match k { 0 => Key::A, 1 => Key::B, _ => Key::C };
                if cancel {
                    timers.cancel(key);
                } else {
                    timers.schedule(key, deadline);
                }
                prop_assert_eq!(timers.by_key.len(), timers.deadlines.len());
                prop_assert!(timers.len() <= 3);
            }

            let mut last = 0;
            while let Some((deadline, _)) = timers.pop_due(u64::MAX) {
                prop_assert!(deadline >= last);
                last = deadline;
            }
        }
    }
}
