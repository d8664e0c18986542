//! Port abstraction layer for serial communication.
//!
//! Provides the transport trait plus a hardware and a mock implementation,
//! enabling dependency injection in the reader pipeline and its tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::PortError;
pub use mock::MockSerialPort;
pub use sync_port::{list_ports, PortInfo, SyncSerialPort};
pub use traits::*;
