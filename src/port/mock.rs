//! Mock serial port implementation for testing.
//!
//! `MockSerialPort` simulates a device without hardware. Reads block on a
//! condition variable until bytes are fed in or the configured timeout
//! elapses, which mirrors how a real port behaves under the reader task.
//! Clones share state, so one clone can play the device while another is
//! handed to a `SerialHandle`.

use super::error::PortError;
use super::traits::{SerialPortAdapter, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct MockPortState {
    /// Bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Every successful write, in order.
    write_log: Vec<Vec<u8>>,
    /// Failure to return from the next read, after queued bytes are consumed.
    pending_read_error: Option<std::io::ErrorKind>,
    /// Failure to return from the next write.
    pending_write_error: Option<std::io::ErrorKind>,
    baud_rate: u32,
    timeout: Duration,
    /// Number of read calls, including ones that timed out.
    read_calls: u64,
    buffers_cleared: bool,
}

#[derive(Debug)]
struct Shared {
    state: Mutex<MockPortState>,
    data_ready: Condvar,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use irblaster_console::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"PRD:IR-8\r\n");
///
/// let mut buffer = [0u8; 16];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"PRD:IR-8\r\n");
///
/// port.write_bytes(b"3:FWV?\r\n").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"3:FWV?\r\n".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    name: String,
    shared: Arc<Shared>,
}

impl MockSerialPort {
    /// Create a new mock serial port at the default baud rate and timeout.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_settings(name, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT)
    }

    /// Create a mock port running at `baud_rate` with the given read timeout.
    pub fn with_settings(name: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            name: name.into(),
            shared: Arc::new(Shared {
                state: Mutex::new(MockPortState {
                    read_queue: VecDeque::new(),
                    write_log: Vec::new(),
                    pending_read_error: None,
                    pending_write_error: None,
                    baud_rate,
                    timeout,
                    read_calls: 0,
                    buffers_cleared: false,
                }),
                data_ready: Condvar::new(),
            }),
        }
    }

    /// Feed bytes that the "device" sends; wakes any blocked reader.
    pub fn enqueue_read(&self, data: &[u8]) {
        let mut state = self.shared.state.lock();
        state.read_queue.extend(data);
        self.shared.data_ready.notify_all();
    }

    /// Make the next read fail with `kind` once already-queued bytes are drained.
    pub fn fail_next_read(&self, kind: std::io::ErrorKind) {
        let mut state = self.shared.state.lock();
        state.pending_read_error = Some(kind);
        self.shared.data_ready.notify_all();
    }

    /// Make the next write fail with `kind`.
    pub fn fail_next_write(&self, kind: std::io::ErrorKind) {
        self.shared.state.lock().pending_write_error = Some(kind);
    }

    /// Change the baud rate the port reports, as if reconfigured underneath.
    pub fn set_baud_rate(&self, baud_rate: u32) {
        self.shared.state.lock().baud_rate = baud_rate;
    }

    /// Get a copy of all data written to the port.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.shared.state.lock().write_log.clone()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.shared.state.lock().write_log.clear();
    }

    /// How many times `read_bytes` has been called on any clone.
    pub fn read_calls(&self) -> u64 {
        self.shared.state.lock().read_calls
    }

    /// Get whether buffers have been cleared.
    pub fn was_cleared(&self) -> bool {
        self.shared.state.lock().buffers_cleared
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.shared.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.shared.state.lock();
        if let Some(kind) = state.pending_write_error.take() {
            return Err(PortError::Io(std::io::Error::new(kind, "simulated write failure")));
        }
        state.write_log.push(data.to_vec());
        Ok(data.len())
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.shared.state.lock();
        state.read_calls += 1;
        let deadline = Instant::now() + state.timeout;

        while state.read_queue.is_empty() && state.pending_read_error.is_none() {
            if self
                .shared
                .data_ready
                .wait_until(&mut state, deadline)
                .timed_out()
            {
                break;
            }
        }

        if state.read_queue.is_empty() {
            return match state.pending_read_error.take() {
                Some(kind) => Err(PortError::Io(std::io::Error::new(
                    kind,
                    "simulated read failure",
                ))),
                None => Err(PortError::timeout(state.timeout)),
            };
        }

        let n = buffer.len().min(state.read_queue.len());
        for (slot, byte) in buffer.iter_mut().zip(state.read_queue.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn baud_rate(&self) -> Result<u32, PortError> {
        Ok(self.shared.state.lock().baud_rate)
    }

    fn timeout(&self) -> Duration {
        self.shared.state.lock().timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.shared.state.lock().timeout = timeout;
        Ok(())
    }

    fn clear_buffers(&mut self) -> Result<(), PortError> {
        let mut state = self.shared.state.lock();
        state.read_queue.clear();
        state.buffers_cleared = true;
        Ok(())
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(self.clone()))
    }
}

impl std::fmt::Debug for MockSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSerialPort")
            .field("name", &self.name)
            .field("available_bytes", &self.available_bytes())
            .finish()
    }
}
