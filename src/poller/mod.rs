//! Delivers queued lines to observers on the owning context.
//!
//! The poller is the consumer half of the pipeline. It never blocks on the
//! serial port; each [`LinePoller::drain_once`] takes a snapshot of the queue
//! and fans every line out to the registered observers in order.

mod observers;

pub use observers::{
    format_sent, is_sentinel, ConsolePrinter, Direction, OutputFormat, SentinelResponder,
    Transcript, TranscriptEntry, AUTO_RESPONSE, SENTINEL,
};

use crate::port::PortError;
use crate::queue::LineQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{trace, warn};

/// Failure reported by a single observer. Never stops delivery to the others.
#[derive(Debug, Error)]
pub enum ObserverError {
    #[error("serial write failed: {0}")]
    Port(#[from] PortError),

    #[error("output failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Something that wants to see every received line.
#[cfg_attr(test, mockall::automock)]
pub trait LineObserver: Send {
    fn on_line(&mut self, line: &str) -> Result<(), ObserverError>;
}

impl<F> LineObserver for F
where
    F: FnMut(&str) -> Result<(), ObserverError> + Send,
{
    fn on_line(&mut self, line: &str) -> Result<(), ObserverError> {
        self(line)
    }
}

/// Identifies a registration so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

struct Registration {
    id: ObserverId,
    label: String,
    observer: Box<dyn LineObserver>,
}

/// Cancels a running [`LinePoller::run`] loop. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Fans queued lines out to observers.
#[derive(Default)]
pub struct LinePoller {
    observers: Vec<Registration>,
    next_id: u64,
    delivered: u64,
    failures: u64,
}

impl LinePoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer; it sees lines after every observer registered before it.
    pub fn register(
        &mut self,
        label: impl Into<String>,
        observer: impl LineObserver + 'static,
    ) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push(Registration {
            id,
            label: label.into(),
            observer: Box::new(observer),
        });
        id
    }

    /// Remove an observer. Returns `false` if `id` was not registered.
    pub fn unregister(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|r| r.id != id);
        self.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Lines delivered since creation.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Observer calls that returned an error since creation.
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Deliver every line queued at the moment of the call.
    ///
    /// Returns the number of lines taken. An empty queue returns 0.
    pub fn drain_once(&mut self, queue: &LineQueue) -> usize {
        let lines = queue.drain_available();
        let count = lines.len();

        for line in lines {
            for registration in &mut self.observers {
                if let Err(e) = registration.observer.on_line(&line) {
                    self.failures += 1;
                    warn!(observer = %registration.label, error = %e, "observer failed");
                }
            }
            self.delivered += 1;
        }

        if count > 0 {
            trace!(lines = count, "drained line queue");
        }
        count
    }

    /// Drain repeatedly until `cancel` fires.
    ///
    /// Between drains the poller sleeps on the queue until a line arrives or
    /// `interval` passes, so cancellation is noticed within one interval.
    /// Returns the number of lines delivered by this call.
    pub fn run(&mut self, queue: &LineQueue, cancel: &CancelToken, interval: Duration) -> u64 {
        let mut total = 0u64;
        while !cancel.is_cancelled() {
            total += self.drain_once(queue) as u64;
            queue.wait_for_lines(interval);
        }
        total
    }
}

impl std::fmt::Debug for LinePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels: Vec<&str> = self.observers.iter().map(|r| r.label.as_str()).collect();
        f.debug_struct("LinePoller")
            .field("observers", &labels)
            .field("delivered", &self.delivered)
            .finish()
    }
}
