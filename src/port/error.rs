//! Port-specific error types.
//!
//! Only configuration and lifecycle problems surface as errors. Short reads,
//! short writes and use of a closed transport are reported as byte counts.

use std::time::Duration;
use thiserror::Error;

/// Highest port number accepted by [`crate::SerialTransport::open`].
pub const MAX_PORT_NUMBER: u32 = 255;

/// Longest per-operation timeout accepted at open.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The specified serial port was not found on the system.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// An I/O error occurred during port operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying transport rejected the requested parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Port number outside `0..=255`.
    #[error("Invalid port number {0} (expected 0..={MAX_PORT_NUMBER})")]
    InvalidPortNumber(u32),

    /// Requested timeout above [`MAX_TIMEOUT`].
    #[error("Timeout of {0:?} exceeds the maximum of {MAX_TIMEOUT:?}")]
    TimeoutOutOfRange(Duration),

    /// Attempted to open a port that's already open.
    #[error("Port is already open")]
    AlreadyOpen,

    /// A background receiver is still alive for this transport.
    #[error("Background receiver is already running")]
    ReceiverAlreadyRunning,

    /// The background receiver did not stop within the shutdown window.
    #[error("Background receiver did not stop within {0:?}")]
    ShutdownTimeout(Duration),

    /// A serialport-specific error occurred.
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Config error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Whether this error means an open attempt failed and left the
    /// transport closed.
    pub fn is_open_failure(&self) -> bool {
        !matches!(
            self,
            Self::AlreadyOpen | Self::ReceiverAlreadyRunning | Self::ShutdownTimeout(_)
        )
    }

    /// Map a `serialport` open error onto our variants.
    pub(crate) fn from_open(port_name: &str, err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::not_found(port_name),
            serialport::ErrorKind::InvalidInput => Self::config(err.to_string()),
            _ => Self::Serial(err),
        }
    }
}
