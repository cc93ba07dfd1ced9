//! Timer queue for sleeping tasks
//!
//! Entries are ordered by wake time, then by insertion sequence, so tasks that
//! asked to wake at the same instant come out in the order they went in.
//! Unlike a plain binary heap this supports removal, which cancellation needs
//! to keep a task out of the queue once it is no longer sleeping.

use crate::scheduler::TaskId;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::time::Instant;

/// Ordering key of a timer entry
type TimerKey = (Instant, u64);

/// Tasks waiting for a wake time, earliest first
#[derive(Debug, Default)]
pub struct TimerQueue {
    /// Wake order
    entries: BTreeMap<TimerKey, TaskId>,
    /// Reverse index for removal
    index: FxHashMap<TaskId, TimerKey>,
    /// Insertion counter for FIFO tie-breaking
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` to wake at `wake_at`.
    ///
    /// A task holds at most one entry; inserting it again replaces the old one.
    pub fn insert(&mut self, wake_at: Instant, task: TaskId) {
        self.remove(task);
        let key = (wake_at, self.next_seq);
        self.next_seq += 1;
        self.entries.insert(key, task);
        self.index.insert(task, key);
    }

    /// Remove and return every task due at or before `now`, in wake order.
    pub fn pop_due(&mut self, now: Instant) -> Vec<TaskId> {
        let mut due = Vec::new();
        while let Some((&(wake_at, _), _)) = self.entries.first_key_value() {
            if wake_at > now {
                break;
            }
            if let Some((_, task)) = self.entries.pop_first() {
                self.index.remove(&task);
                due.push(task);
            }
        }
        due
    }

    /// Remove `task`'s entry. Returns false if it was not queued.
    pub fn remove(&mut self, task: TaskId) -> bool {
        match self.index.remove(&task) {
            Some(key) => {
                self.entries.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Whether `task` has an entry
    pub fn contains(&self, task: TaskId) -> bool {
        self.index.contains_key(&task)
    }

    /// Earliest wake time, if any
    pub fn next_wake(&self) -> Option<Instant> {
        self.entries.first_key_value().map(|(&(wake_at, _), _)| wake_at)
    }

    /// Number of sleeping tasks
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no task is sleeping
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
