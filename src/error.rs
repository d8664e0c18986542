use crate::commands::PayloadError;
use crate::config::ConfigError;
use crate::port::PortError;
use crate::reader::ReaderError;
use crate::service::ServiceError;
use std::fmt;

/// A specialized `Result` type for the console binary.
pub type AppResult<T> = Result<T, AppError>;

/// Unified application error type.
///
/// Library modules return their own errors; the binary funnels them all
/// through this type so `?` works from `main` down.
#[derive(Debug)]
pub enum AppError {
    Port(PortError),
    Reader(ReaderError),
    Service(ServiceError),
    Config(ConfigError),
    InvalidPayload(PayloadError),
    IoError(std::io::Error),
    SerdeError(serde_json::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(e) => write!(f, "A serial port error occurred: {e}"),
            Self::Reader(e) => write!(f, "The line reader failed: {e}"),
            Self::Service(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "Configuration problem: {e}"),
            Self::InvalidPayload(e) => write!(f, "The payload is invalid: {e}"),
            Self::IoError(e) => write!(f, "An I/O error occurred: {e}"),
            Self::SerdeError(e) => write!(f, "A serialization error occurred: {e}"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Port(e) => Some(e),
            Self::Reader(e) => Some(e),
            Self::Service(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::InvalidPayload(e) => Some(e),
            Self::IoError(e) => Some(e),
            Self::SerdeError(e) => Some(e),
        }
    }
}

// Implement `From` conversions to allow the `?` operator to work seamlessly.
impl From<PortError> for AppError {
    fn from(err: PortError) -> Self {
        AppError::Port(err)
    }
}

impl From<ReaderError> for AppError {
    fn from(err: ReaderError) -> Self {
        AppError::Reader(err)
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        AppError::Service(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<PayloadError> for AppError {
    fn from(err: PayloadError) -> Self {
        AppError::InvalidPayload(err)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::SerdeError(err)
    }
}
