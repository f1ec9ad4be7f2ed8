//! Save debouncing
//!
//! Every mutation re-arms a single quiescence window; a flush is due only once
//! the store has been idle for longer than the window. A busy flag brackets the
//! flush so a second one cannot start while the first is in flight.

use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
pub struct SaveScheduler {
    interval: Duration,
    dirty: bool,
    last_change: Option<Instant>,
    busy: bool,
}

impl SaveScheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            dirty: false,
            last_change: None,
            busy: false,
        }
    }

    /// Also honored while busy; the change is picked up by the next window
    pub fn mark_dirty(&mut self, now: Instant) {
        self.dirty = true;
        self.last_change = Some(now);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_due(&self, now: Instant) -> bool {
        !self.busy
            && self.dirty
            && self
                .last_change
                .is_some_and(|changed| now.saturating_duration_since(changed) > self.interval)
    }

    /// Enter the busy window if a flush is due, clearing the dirty flag
    pub fn begin_flush(&mut self, now: Instant) -> bool {
        if !self.is_due(now) {
            return false;
        }
        self.start();
        true
    }

    /// Enter the busy window without waiting for quiescence (shutdown path)
    pub fn begin_flush_now(&mut self) -> bool {
        if self.busy || !self.dirty {
            return false;
        }
        self.start();
        true
    }

    fn start(&mut self) {
        debug!("Flush started");
        self.busy = true;
        self.dirty = false;
    }

    pub fn end_flush(&mut self) {
        debug!(dirty = self.dirty, "Flush finished");
        self.busy = false;
    }
}
