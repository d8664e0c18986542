//! Thread-safe FIFO of decoded serial lines.
//!
//! The reader task pushes, the poller drains. The queue's mutex is the only
//! state shared between the two; a condition variable lets the consumer sleep
//! until data arrives instead of spinning.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Unbounded, ordered queue of text lines.
#[derive(Debug, Default)]
pub struct LineQueue {
    lines: Mutex<VecDeque<String>>,
    available: Condvar,
}

impl LineQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line and wake a waiting consumer.
    pub fn push(&self, line: String) {
        let mut lines = self.lines.lock();
        lines.push_back(line);
        self.available.notify_one();
    }

    /// Take every line present right now, oldest first.
    ///
    /// Lines pushed after the lock is released are left for the next call, so
    /// a producer that never pauses cannot keep this from returning.
    pub fn drain_available(&self) -> VecDeque<String> {
        std::mem::take(&mut *self.lines.lock())
    }

    /// Block until at least one line is queued or `timeout` elapses.
    ///
    /// Returns `true` when lines are available.
    pub fn wait_for_lines(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut lines = self.lines.lock();
        while lines.is_empty() {
            if self.available.wait_until(&mut lines, deadline).timed_out() {
                break;
            }
        }
        !lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
