//! The open serial connection shared by the reader task and the write path.

use crate::port::{PortConfiguration, PortError, SerialPortAdapter, SyncSerialPort};
use crate::reader::{self, ReaderTask, TaskStatus};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Boxed transport, real or mock.
pub type PortAdapter = Box<dyn SerialPortAdapter>;

/// An open serial connection.
///
/// The handle owns two adapters onto the same device. The read half is moved
/// into the reader task by [`reader::start`]; the write half stays here behind
/// its own lock. The `open` flag is the cancellation signal for the task and
/// is cleared either by [`SerialHandle::close`] or by the task itself when it
/// exits, so a faulted task leaves the handle reporting closed.
pub struct SerialHandle {
    name: String,
    baud_rate: u32,
    timeout: Duration,
    pub(crate) open: Arc<AtomicBool>,
    pub(crate) writer: Mutex<Option<PortAdapter>>,
    pub(crate) read_half: Mutex<Option<PortAdapter>>,
    pub(crate) task: Mutex<Option<ReaderTask>>,
    pub(crate) status: Arc<Mutex<TaskStatus>>,
}

impl SerialHandle {
    /// Open a hardware port.
    pub fn open(port_name: &str, config: PortConfiguration) -> Result<Self, PortError> {
        let port = SyncSerialPort::open(port_name, config)?;
        Self::from_adapter(Box::new(port))
    }

    /// Wrap an already-open adapter, e.g. a `MockSerialPort`.
    pub fn from_adapter(adapter: PortAdapter) -> Result<Self, PortError> {
        let read_half = adapter.try_clone_adapter()?;
        let baud_rate = adapter.baud_rate()?;
        let timeout = adapter.timeout();
        let name = adapter.name().to_string();

        info!(port = %name, baud_rate, timeout_ms = timeout.as_millis() as u64, "serial port opened");

        Ok(Self {
            name,
            baud_rate,
            timeout,
            open: Arc::new(AtomicBool::new(true)),
            writer: Mutex::new(Some(adapter)),
            read_half: Mutex::new(Some(read_half)),
            task: Mutex::new(None),
            status: Arc::new(Mutex::new(TaskStatus::Idle)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Baud rate the port was opened with.
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Per-read timeout; the worst-case latency of [`SerialHandle::close`].
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Current state of the reader task bound to this handle.
    pub fn reader_status(&self) -> TaskStatus {
        self.status.lock().clone()
    }

    /// Write raw bytes to the device.
    ///
    /// The open check happens under the writer lock, so a write can never land
    /// on a port that `close` has already released.
    pub fn write(&self, data: &[u8]) -> Result<usize, PortError> {
        let mut writer = self.writer.lock();
        if !self.is_open() {
            return Err(PortError::NotOpen);
        }
        let port = writer.as_mut().ok_or(PortError::NotOpen)?;
        let written = port.write_bytes(data)?;
        debug!(port = %self.name, bytes = written, "wrote to serial port");
        Ok(written)
    }

    /// Stop the reader task and release the port.
    ///
    /// Returns the task's final status. Safe to call repeatedly.
    pub fn close(&self) -> TaskStatus {
        reader::stop(self)
    }
}

impl Drop for SerialHandle {
    fn drop(&mut self) {
        reader::stop(self);
    }
}

impl std::fmt::Debug for SerialHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialHandle")
            .field("name", &self.name)
            .field("baud_rate", &self.baud_rate)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;

    fn mock_handle() -> (MockSerialPort, SerialHandle) {
        let device = MockSerialPort::with_settings("MOCK0", 19_200, Duration::from_millis(20));
        let handle = SerialHandle::from_adapter(Box::new(device.clone())).unwrap();
        (device, handle)
    }

    #[test]
    fn test_handle_reports_adapter_settings() {
        let (_device, handle) = mock_handle();
        assert_eq!(handle.name(), "MOCK0");
        assert_eq!(handle.baud_rate(), 19_200);
        assert_eq!(handle.timeout(), Duration::from_millis(20));
        assert!(handle.is_open());
        assert_eq!(handle.reader_status(), TaskStatus::Idle);
    }

    #[test]
    fn test_write_reaches_device() {
        let (device, handle) = mock_handle();
        assert_eq!(handle.write(b"3:PRD?\r\n").unwrap(), 8);
        assert_eq!(device.get_write_log(), vec![b"3:PRD?\r\n".to_vec()]);
    }

    #[test]
    fn test_write_after_close_fails() {
        let (device, handle) = mock_handle();
        handle.close();
        assert!(!handle.is_open());
        assert!(matches!(handle.write(b"x"), Err(PortError::NotOpen)));
        assert!(device.get_write_log().is_empty());
    }

    #[test]
    fn test_close_without_reader_is_noop() {
        let (_device, handle) = mock_handle();
        assert_eq!(handle.close(), TaskStatus::Idle);
        assert_eq!(handle.close(), TaskStatus::Idle);
    }
}
