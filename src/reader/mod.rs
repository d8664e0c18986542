//! Background reader that turns serial input into queued lines.
//!
//! One task per [`SerialHandle`]. The task owns the handle's read half and
//! loops until the handle's open flag is cleared or something goes wrong:
//!
//! ```text
//! Idle ──start──> Running ──close──────────> Stopped
//!                    │ ────I/O or decode──> Faulted(Io | Decode)
//!                    └────baud changed────> Faulted(BaudMismatch)
//! ```
//!
//! A task never returns to `Running`; recovery is close and reopen.

mod framing;

pub use framing::{LineFramer, MAX_LINE_LEN};

use crate::handle::{PortAdapter, SerialHandle};
use crate::queue::LineQueue;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const READ_CHUNK: usize = 256;

/// Why a reader could not start, or why it stopped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("a reader task is already running for this port")]
    AlreadyRunning,

    #[error("serial port is not open")]
    NotOpen,

    #[error("port runs at {actual} baud but {expected} baud is configured")]
    BaudMismatch { expected: u32, actual: u32 },

    #[error("serial I/O failed: {0}")]
    Io(String),

    #[error("received bytes are not valid UTF-8: {0}")]
    Decode(String),
}

impl ReaderError {
    /// Decode failures count as I/O failures for the task.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Decode(_))
    }
}

/// Lifecycle state of a handle's reader task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Idle,
    Running,
    /// Exited because the handle was closed.
    Stopped,
    Faulted(ReaderError),
}

impl TaskStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn fault(&self) -> Option<&ReaderError> {
        match self {
            Self::Faulted(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Faulted(e) => write!(f, "faulted: {e}"),
        }
    }
}

/// Join handle of a spawned reader thread.
pub struct ReaderTask {
    join: JoinHandle<()>,
}

impl ReaderTask {
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Spawn the reader task for `handle`.
///
/// Each decoded line is pushed onto `queue` exactly once. The task checks on
/// every iteration that the port still runs at `expected_baud`.
///
/// # Errors
///
/// - `ReaderError::AlreadyRunning` if a task for this handle is still alive;
///   nothing is spawned
/// - `ReaderError::NotOpen` if the handle was closed or its task already ran
/// - `ReaderError::Io` if the thread could not be spawned
pub fn start(
    handle: &SerialHandle,
    expected_baud: u32,
    queue: Arc<LineQueue>,
) -> Result<(), ReaderError> {
    let mut task = handle.task.lock();
    if task.as_ref().is_some_and(|t| !t.is_finished()) {
        return Err(ReaderError::AlreadyRunning);
    }
    if !handle.is_open() {
        return Err(ReaderError::NotOpen);
    }
    let port = handle.read_half.lock().take().ok_or(ReaderError::NotOpen)?;

    *handle.status.lock() = TaskStatus::Running;
    let reader = ReadLoop {
        port,
        expected_baud,
        queue,
        open: Arc::clone(&handle.open),
        status: Arc::clone(&handle.status),
    };

    let spawned = thread::Builder::new()
        .name(format!("serial-reader:{}", handle.name()))
        .spawn(move || reader.run());

    match spawned {
        Ok(join) => {
            info!(port = %handle.name(), expected_baud, "reader task started");
            *task = Some(ReaderTask { join });
            Ok(())
        }
        Err(e) => {
            let err = ReaderError::Io(e.to_string());
            handle.open.store(false, Ordering::Release);
            *handle.status.lock() = TaskStatus::Faulted(err.clone());
            Err(err)
        }
    }
}

/// Signal the task to exit, wait for it, then release the port.
///
/// The wait is bounded by the handle's read timeout. Returns the task's final
/// status; when no task ever ran this only closes the handle.
pub fn stop(handle: &SerialHandle) -> TaskStatus {
    let was_open = handle.open.swap(false, Ordering::AcqRel);

    let task = handle.task.lock().take();
    if let Some(task) = task {
        if task.join.join().is_err() {
            *handle.status.lock() =
                TaskStatus::Faulted(ReaderError::Io("reader thread panicked".into()));
        }
    }

    handle.writer.lock().take();
    handle.read_half.lock().take();

    if was_open {
        info!(port = %handle.name(), "serial port closed");
    }
    handle.reader_status()
}

/// Current status of the task bound to `handle`.
pub fn status(handle: &SerialHandle) -> TaskStatus {
    handle.reader_status()
}

struct ReadLoop {
    port: PortAdapter,
    expected_baud: u32,
    queue: Arc<LineQueue>,
    open: Arc<AtomicBool>,
    status: Arc<Mutex<TaskStatus>>,
}

impl ReadLoop {
    fn run(mut self) {
        let outcome = self.read_lines();
        let port = self.port.name().to_string();

        let final_status = match outcome {
            Ok(()) => {
                info!(port = %port, "reader task stopped");
                TaskStatus::Stopped
            }
            Err(e) => {
                error!(port = %port, error = %e, "reader task faulted");
                TaskStatus::Faulted(e)
            }
        };

        *self.status.lock() = final_status;
        // The task exiting is what marks the handle closed.
        self.open.store(false, Ordering::Release);
    }

    fn read_lines(&mut self) -> Result<(), ReaderError> {
        let mut buffer = [0u8; READ_CHUNK];
        let mut framer = LineFramer::new();

        while self.open.load(Ordering::Acquire) {
            let actual = self
                .port
                .baud_rate()
                .map_err(|e| ReaderError::Io(e.to_string()))?;
            if actual != self.expected_baud {
                return Err(ReaderError::BaudMismatch {
                    expected: self.expected_baud,
                    actual,
                });
            }

            let n = match self.port.read_bytes(&mut buffer) {
                Ok(n) => n,
                Err(e) if e.is_timeout() => continue,
                Err(e) => return Err(ReaderError::Io(e.to_string())),
            };
            if n == 0 {
                continue;
            }

            framer.extend(&buffer[..n]);
            while let Some(raw) = framer.next_line() {
                let line = String::from_utf8(raw).map_err(|e| ReaderError::Decode(e.to_string()))?;
                debug!(port = %self.port.name(), line = %line, "line received");
                self.queue.push(line);
            }
            let dropped = framer.take_discarded();
            if dropped > 0 {
                warn!(
                    port = %self.port.name(),
                    dropped,
                    max = MAX_LINE_LEN,
                    "discarded bytes of an over-long line"
                );
            }
        }

        Ok(())
    }
}
