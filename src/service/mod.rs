//! Service layer tying the pipeline together.
//!
//! [`ConsoleService`] is the explicit context the console runs on: the open
//! handle, the line queue, the poller and its observers, and the transcripts.
//! Everything except the reader task lives on the owning thread.
//!
//! # Architecture
//!
//! ```text
//!            reader thread                    owning thread
//! port ──> SerialHandle ──> LineQueue ──> ConsoleService::tick ──> observers
//!              ▲                                   │
//!              └──────── send_* / SentinelResponder┘
//! ```

use crate::commands::{encode_payload, PayloadFormat, Preset};
use crate::config::Config;
use crate::handle::{PortAdapter, SerialHandle};
use crate::poller::{
    format_sent, Direction, LineObserver, LinePoller, ObserverId, SentinelResponder, Transcript,
};
use crate::queue::LineQueue;
use crate::reader::{self, ReaderError, TaskStatus};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

// ========== Error Types ==========

/// Service-specific errors for console operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Port is already open when attempting to open
    PortAlreadyOpen,
    /// Port is closed when operation requires it to be open
    PortNotOpen,
    /// No port name given and none configured
    NoPortSpecified,
    /// Port operation failed
    PortError(String),
    /// Reader task could not be started
    Reader(ReaderError),
    /// Typed input could not be encoded
    InvalidPayload(String),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PortAlreadyOpen => write!(f, "Port is already open"),
            Self::PortNotOpen => write!(f, "Port is not open"),
            Self::NoPortSpecified => write!(f, "No port name specified"),
            Self::PortError(msg) => write!(f, "Port operation failed: {}", msg),
            Self::Reader(e) => write!(f, "Reader failed to start: {}", e),
            Self::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Convenient Result type for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

// ========== Response DTOs ==========

/// Result from opening a port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResult {
    pub port_name: String,
    pub baud_rate: u32,
    pub message: String,
}

/// Result from closing a port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseResult {
    pub message: String,
    /// Final reader state, e.g. "stopped" or "faulted: ..."
    pub reader: Option<String>,
}

/// Result from writing data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub bytes_written: usize,
    pub bytes_written_total: u64,
}

/// Port status information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "PascalCase")]
pub enum StatusResult {
    Closed {
        /// Why the last reader ended, if it did not stop cleanly
        #[serde(skip_serializing_if = "Option::is_none")]
        last_fault: Option<String>,
    },
    Open {
        port_name: String,
        baud_rate: u32,
        timeout_ms: u64,
        reader: String,
        lines_delivered: u64,
        bytes_written_total: u64,
    },
}

// ========== Service Implementation ==========

/// Owned console context: one port at a time, one queue, one poller.
pub struct ConsoleService {
    config: Config,
    handle: Option<Arc<SerialHandle>>,
    queue: Arc<LineQueue>,
    poller: LinePoller,
    received: Transcript,
    sent: Transcript,
    responder: Option<ObserverId>,
    last_fault: Option<ReaderError>,
    bytes_written_total: u64,
}

impl ConsoleService {
    /// Create a service with a received-line transcript already registered.
    pub fn new(config: Config) -> Self {
        let capacity = config.monitor.transcript_lines;
        let received = Transcript::new(capacity);
        let mut poller = LinePoller::new();
        poller.register("transcript", received.clone());

        Self {
            config,
            handle: None,
            queue: Arc::new(LineQueue::new()),
            poller,
            received,
            sent: Transcript::new(capacity),
            responder: None,
            last_fault: None,
            bytes_written_total: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a hardware port with the configured line settings.
    ///
    /// `port_name` falls back to `serial.port` and is resolved through the
    /// configured aliases.
    ///
    /// # Errors
    ///
    /// - `ServiceError::PortAlreadyOpen` if a port is already open
    /// - `ServiceError::NoPortSpecified` if no name is given or configured
    /// - `ServiceError::PortError` if the port cannot be opened
    /// - `ServiceError::Reader` if the reader task cannot be started
    pub fn open(&mut self, port_name: Option<&str>) -> ServiceResult<OpenResult> {
        self.ensure_closed()?;

        let requested = port_name
            .map(str::to_string)
            .or_else(|| self.config.serial.port.clone())
            .ok_or(ServiceError::NoPortSpecified)?;
        let name = self.config.serial.resolve_port(&requested);

        let handle = SerialHandle::open(&name, self.config.serial.port_configuration())
            .map_err(|e| ServiceError::PortError(e.to_string()))?;
        self.attach(handle)
    }

    /// Open on an already-constructed transport, such as a mock.
    ///
    /// # Errors
    ///
    /// Same as [`ConsoleService::open`], minus name resolution.
    pub fn open_with_adapter(&mut self, adapter: PortAdapter) -> ServiceResult<OpenResult> {
        self.ensure_closed()?;
        let handle =
            SerialHandle::from_adapter(adapter).map_err(|e| ServiceError::PortError(e.to_string()))?;
        self.attach(handle)
    }

    fn ensure_closed(&mut self) -> ServiceResult<()> {
        if self.handle.as_ref().is_some_and(|h| h.is_open()) {
            return Err(ServiceError::PortAlreadyOpen);
        }
        // A handle whose reader already exited is released before reopening.
        if self.handle.is_some() {
            self.close()?;
        }
        Ok(())
    }

    fn attach(&mut self, handle: SerialHandle) -> ServiceResult<OpenResult> {
        let handle = Arc::new(handle);
        if let Err(e) = reader::start(&handle, self.config.serial.baud_rate, Arc::clone(&self.queue))
        {
            handle.close();
            return Err(ServiceError::Reader(e));
        }

        if self.config.monitor.sentinel_response {
            let responder =
                SentinelResponder::new(Arc::clone(&handle)).with_outbound_log(self.sent.clone());
            self.responder = Some(self.poller.register("sentinel", responder));
        }

        let result = OpenResult {
            port_name: handle.name().to_string(),
            baud_rate: handle.baud_rate(),
            message: "opened".to_string(),
        };
        self.last_fault = None;
        self.handle = Some(handle);
        Ok(result)
    }

    /// Close the current port.
    ///
    /// This operation is idempotent - closing an already-closed port succeeds.
    /// Lines already queued stay queued and are delivered by the next tick.
    pub fn close(&mut self) -> ServiceResult<CloseResult> {
        if let Some(id) = self.responder.take() {
            self.poller.unregister(id);
        }

        let Some(handle) = self.handle.take() else {
            return Ok(CloseResult {
                message: "already closed".to_string(),
                reader: None,
            });
        };

        let status = handle.close();
        self.last_fault = status.fault().cloned();
        info!(port = %handle.name(), reader = %status, "console closed port");

        Ok(CloseResult {
            message: "closed".to_string(),
            reader: Some(status.to_string()),
        })
    }

    fn open_handle(&self) -> ServiceResult<&Arc<SerialHandle>> {
        self.handle
            .as_ref()
            .filter(|h| h.is_open())
            .ok_or(ServiceError::PortNotOpen)
    }

    /// Write raw bytes and log them to the outbound transcript.
    ///
    /// # Errors
    ///
    /// - `ServiceError::PortNotOpen` if no port is open
    /// - `ServiceError::PortError` if the write operation fails
    pub fn send_bytes(&mut self, data: &[u8]) -> ServiceResult<WriteResult> {
        let handle = self.open_handle()?;
        let bytes = handle
            .write(data)
            .map_err(|e| ServiceError::PortError(e.to_string()))?;

        self.bytes_written_total += bytes as u64;
        self.sent.record(Direction::Tx, format_sent(data));

        Ok(WriteResult {
            bytes_written: bytes,
            bytes_written_total: self.bytes_written_total,
        })
    }

    /// Send one of the fixed device commands.
    pub fn send_preset(&mut self, preset: Preset) -> ServiceResult<WriteResult> {
        debug!(preset = preset.label(), "sending preset");
        self.send_bytes(preset.payload())
    }

    /// Encode typed input and send it.
    ///
    /// # Errors
    ///
    /// `ServiceError::InvalidPayload` if `text` is not valid in `format`,
    /// otherwise as [`ConsoleService::send_bytes`].
    pub fn send_text(
        &mut self,
        text: &str,
        format: PayloadFormat,
        append_crlf: bool,
    ) -> ServiceResult<WriteResult> {
        let payload = encode_payload(text, format, append_crlf)
            .map_err(|e| ServiceError::InvalidPayload(e.to_string()))?;
        self.send_bytes(&payload)
    }

    /// Deliver every queued line to the observers. Returns the number of lines.
    pub fn tick(&mut self) -> usize {
        self.poller.drain_once(&self.queue)
    }

    /// Block until a line is queued or `timeout` passes.
    pub fn wait_for_lines(&self, timeout: Duration) -> bool {
        self.queue.wait_for_lines(timeout)
    }

    /// Add an observer after the ones already registered.
    pub fn register_observer(
        &mut self,
        label: impl Into<String>,
        observer: impl LineObserver + 'static,
    ) -> ObserverId {
        self.poller.register(label, observer)
    }

    pub fn unregister_observer(&mut self, id: ObserverId) -> bool {
        self.poller.unregister(id)
    }

    /// The queue shared with the reader task.
    pub fn queue(&self) -> Arc<LineQueue> {
        Arc::clone(&self.queue)
    }

    pub fn received(&self) -> &Transcript {
        &self.received
    }

    pub fn sent(&self) -> &Transcript {
        &self.sent
    }

    pub fn clear_transcripts(&self) {
        self.received.clear();
        self.sent.clear();
    }

    /// Reader state of the current handle; `Idle` when nothing is open.
    pub fn reader_status(&self) -> TaskStatus {
        self.handle
            .as_ref()
            .map(|h| h.reader_status())
            .unwrap_or_default()
    }

    pub fn is_open(&self) -> bool {
        self.open_handle().is_ok()
    }

    /// Report whether a port is open, and if not, why the last one ended.
    pub fn status(&self) -> StatusResult {
        match &self.handle {
            Some(handle) if handle.is_open() => StatusResult::Open {
                port_name: handle.name().to_string(),
                baud_rate: handle.baud_rate(),
                timeout_ms: handle.timeout().as_millis() as u64,
                reader: handle.reader_status().to_string(),
                lines_delivered: self.poller.delivered(),
                bytes_written_total: self.bytes_written_total,
            },
            Some(handle) => StatusResult::Closed {
                last_fault: handle.reader_status().fault().map(ToString::to_string),
            },
            None => StatusResult::Closed {
                last_fault: self.last_fault.as_ref().map(ToString::to_string),
            },
        }
    }
}

impl Drop for ConsoleService {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

impl std::fmt::Debug for ConsoleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleService")
            .field("handle", &self.handle)
            .field("queued", &self.queue.len())
            .field("poller", &self.poller)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::poller::AUTO_RESPONSE;
    use crate::port::MockSerialPort;
    use std::time::Instant;

    fn mock(timeout_ms: u64) -> MockSerialPort {
        MockSerialPort::with_settings("MOCK0", 19_200, Duration::from_millis(timeout_ms))
    }

    fn tick_until(service: &mut ConsoleService, mut done: impl FnMut(&ConsoleService) -> bool) {
        let end = Instant::now() + Duration::from_secs(2);
        while Instant::now() < end && !done(service) {
            service.wait_for_lines(Duration::from_millis(5));
            service.tick();
        }
    }

    #[test]
    fn test_open_and_close() {
        let mut service = ConsoleService::new(Config::default());
        let result = service.open_with_adapter(Box::new(mock(20))).unwrap();
        assert_eq!(result.port_name, "MOCK0");
        assert_eq!(result.baud_rate, 19_200);
        assert!(service.is_open());
        assert!(matches!(service.status(), StatusResult::Open { .. }));

        let closed = service.close().unwrap();
        assert_eq!(closed.message, "closed");
        assert_eq!(closed.reader.as_deref(), Some("stopped"));
        assert!(!service.is_open());
        assert_eq!(service.close().unwrap().message, "already closed");
    }

    #[test]
    fn test_second_open_rejected() {
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(mock(20))).unwrap();
        assert_eq!(
            service.open_with_adapter(Box::new(mock(20))).unwrap_err(),
            ServiceError::PortAlreadyOpen
        );
    }

    #[test]
    fn test_open_without_port_name() {
        let mut service = ConsoleService::new(Config::default());
        assert_eq!(service.open(None).unwrap_err(), ServiceError::NoPortSpecified);
    }

    #[test]
    fn test_send_requires_open_port() {
        let mut service = ConsoleService::new(Config::default());
        assert_eq!(
            service.send_preset(Preset::ProductInfo).unwrap_err(),
            ServiceError::PortNotOpen
        );
    }

    #[test]
    fn test_send_preset_and_text() {
        let device = mock(20);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        service.send_preset(Preset::FirmwareVersion).unwrap();
        let result = service
            .send_text("1B 1B", PayloadFormat::Hex, false)
            .unwrap();
        assert_eq!(result.bytes_written, 2);
        assert_eq!(result.bytes_written_total, 10);

        assert_eq!(
            device.get_write_log(),
            vec![b"3:FWV?\r\n".to_vec(), vec![0x1B, 0x1B]]
        );
        assert_eq!(service.sent().len(), 2);
        assert!(matches!(
            service.send_text("zz", PayloadFormat::Hex, false),
            Err(ServiceError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_sentinel_answered_between_lines() {
        let device = mock(20);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        device.enqueue_read(b"hello\r\n.\r\nworld\r\n");
        tick_until(&mut service, |s| s.received().len() == 3);

        assert_eq!(service.received().lines(), vec!["hello", ".", "world"]);
        assert_eq!(device.get_write_log(), vec![AUTO_RESPONSE.to_vec()]);
        assert_eq!(service.sent().len(), 1);
    }

    #[test]
    fn test_sentinel_response_can_be_disabled() {
        let mut config = Config::default();
        config.monitor.sentinel_response = false;

        let device = mock(20);
        let mut service = ConsoleService::new(config);
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        device.enqueue_read(b".\n");
        tick_until(&mut service, |s| s.received().len() == 1);
        assert!(device.get_write_log().is_empty());
    }

    #[test]
    fn test_fault_reported_in_status_and_reopen_allowed() {
        let device = mock(20);
        let mut service = ConsoleService::new(Config::default());
        service.open_with_adapter(Box::new(device.clone())).unwrap();

        device.fail_next_read(std::io::ErrorKind::BrokenPipe);
        tick_until(&mut service, |s| !s.is_open());

        match service.status() {
            StatusResult::Closed { last_fault } => {
                assert!(last_fault.unwrap().contains("serial I/O failed"))
            }
            other => panic!("expected closed status, got {other:?}"),
        }

        service.open_with_adapter(Box::new(mock(20))).unwrap();
        assert!(service.is_open());
    }

    #[test]
    fn test_baud_mismatch_closes_port() {
        let mut config = Config::default();
        config.serial.baud_rate = 9_600;

        let mut service = ConsoleService::new(config);
        service.open_with_adapter(Box::new(mock(20))).unwrap();
        tick_until(&mut service, |s| !s.is_open());

        assert!(matches!(
            service.reader_status(),
            TaskStatus::Faulted(ReaderError::BaudMismatch {
                expected: 9_600,
                actual: 19_200
            })
        ));
    }

    #[test]
    fn test_status_serializes_with_state_tag() {
        let service = ConsoleService::new(Config::default());
        let json = serde_json::to_value(service.status()).unwrap();
        assert_eq!(json["state"], "Closed");
    }
}
