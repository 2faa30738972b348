//! Keyed one-shot timers driven by the controller clock.
//!
//! ```rust
//! use trainz_dispatch::timer::TaskScheduler;
//!
//! let mut timers = TaskScheduler::new();
//! timers.schedule("a", 1_000, 0);
//! timers.schedule("b", 500, 0);
//! assert!(timers.due(400).is_empty());
//! assert_eq!(timers.due(1_000), vec!["b", "a"]);
//! assert!(timers.is_empty());
//! ```

use std::collections::BTreeMap;

/// One pending deadline per key.
#[derive(Clone, Debug, Default)]
pub struct TaskScheduler<K: Ord + Copy> {
    deadlines: BTreeMap<K, u64>,
}

impl<K: Ord + Copy> TaskScheduler<K> {
    pub fn new() -> Self {
        Self {
            deadlines: BTreeMap::new(),
        }
    }

    /// Fire `key` at `now_ms + delay_ms`, replacing any pending deadline.
    /// Returns the replaced deadline.
    pub fn schedule(&mut self, key: K, delay_ms: u64, now_ms: u64) -> Option<u64> {
        self.deadlines.insert(key, now_ms.saturating_add(delay_ms))
    }

    /// Drop the pending deadline of `key`. Returns true if there was one.
    pub fn cancel(&mut self, key: K) -> bool {
        self.deadlines.remove(&key).is_some()
    }

    pub fn deadline(&self, key: K) -> Option<u64> {
        self.deadlines.get(&key).copied()
    }

    /// Remove and return every key whose deadline has passed, earliest first.
    pub fn due(&mut self, now_ms: u64) -> Vec<K> {
        let mut expired: Vec<(u64, K)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now_ms)
            .map(|(key, at)| (*at, *key))
            .collect();
        expired.sort();
        for (_, key) in &expired {
            self.deadlines.remove(key);
        }
        expired.into_iter().map(|(_, key)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
