//! Deferred work on the single loop thread
//!
//! Each task kind has at most one pending entry. Scheduling a kind that is
//! already pending moves its deadline; there is no other way to cancel.

use std::time::Instant;

#[derive(Debug)]
pub struct TaskQueue<K> {
    entries: Vec<(Instant, K)>,
}

impl<K> Default for TaskQueue<K> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<K: Copy + PartialEq> TaskQueue<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind` for `deadline`, replacing any pending entry of the same kind
    pub fn schedule(&mut self, kind: K, deadline: Instant) {
        self.entries.retain(|(_, pending)| *pending != kind);
        self.entries.push((deadline, kind));
    }

    pub fn deadline(&self, kind: K) -> Option<Instant> {
        self.entries
            .iter()
            .find(|(_, pending)| *pending == kind)
            .map(|(deadline, _)| *deadline)
    }

    pub fn is_scheduled(&self, kind: K) -> bool {
        self.deadline(kind).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every task whose deadline has passed, earliest first
    pub fn poll(&mut self, now: Instant) -> Vec<K> {
        let mut due: Vec<(Instant, K)> = Vec::new();
        self.entries.retain(|&(deadline, kind)| {
            if deadline <= now {
                due.push((deadline, kind));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(deadline, _)| *deadline);
        due.into_iter().map(|(_, kind)| kind).collect()
    }
}
