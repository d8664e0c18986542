//! IR Blaster Console Library
//!
//! Serial line pipeline for an IR-blaster's text console: a background reader
//! turns bytes into lines, a queue hands them to the owning thread, and a
//! poller fans them out to observers such as the sentinel auto-responder.
//!
//! # Modules
//!
//! - `port`: Transport trait with hardware and mock implementations
//! - `handle`: The open connection shared by reader and writers
//! - `reader`: Background line reader task
//! - `queue`: Thread-safe line queue between reader and poller
//! - `poller`: Observer registration and delivery
//! - `commands`: Preset device commands and send encodings
//! - `service`: Owned console context tying the pieces together
//! - `config`: Configuration management with TOML support
//! - `error`: Unified error handling

pub mod commands;
pub mod config;
pub mod error;
pub mod handle;
pub mod poller;
pub mod port;
pub mod queue;
pub mod reader;
pub mod service;

// Re-export commonly used types for convenience
pub use commands::{encode_payload, PayloadError, PayloadFormat, Preset};
pub use error::{AppError, AppResult};
pub use handle::SerialHandle;
pub use poller::{
    CancelToken, LineObserver, LinePoller, ObserverError, ObserverId, SentinelResponder,
    Transcript,
};
pub use port::{
    DataBits, FlowControl, MockSerialPort, Parity, PortConfiguration, PortError, SerialPortAdapter,
    StopBits, SyncSerialPort,
};
pub use queue::LineQueue;
pub use reader::{ReaderError, TaskStatus};
pub use service::{
    CloseResult, ConsoleService, OpenResult, ServiceError, ServiceResult, StatusResult,
    WriteResult,
};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
