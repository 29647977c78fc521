//! Core traits for serial port abstraction.
//!
//! `SerialPortAdapter` lets real serial ports and mock implementations be used
//! interchangeably underneath [`crate::SerialTransport`]. `PortOpener` turns a
//! numeric port identifier into an opened adapter.

use super::error::PortError;
use std::time::Duration;

/// Parameters handed to a [`PortOpener`].
///
/// Framing is always 8 data bits, no parity, one stop bit, no flow control;
/// only the line speed and the per-operation timeout vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortConfiguration {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Timeout applied to blocking operations on the opened port.
    pub timeout: Duration,
}

impl Default for PortConfiguration {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            timeout: Duration::from_secs(1),
        }
    }
}

/// Trait for serial port I/O operations.
///
/// Reads that find no data may either return `Ok(0)` or an I/O error of kind
/// `TimedOut`/`WouldBlock`; the transport treats all three as "nothing yet".
pub trait SerialPortAdapter: Send + std::fmt::Debug {
    /// Write bytes to the serial port.
    ///
    /// Returns the number of bytes actually written.
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError>;

    /// Read bytes from the serial port into the provided buffer.
    ///
    /// Returns the number of bytes actually read.
    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError>;

    /// Get the name/path of this serial port.
    fn name(&self) -> &str;

    /// Set the blocking timeout for this handle.
    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError>;

    /// Open a second handle to the same device.
    ///
    /// The transport reads through one handle and writes through the other
    /// so that the two directions never contend for the same object.
    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

/// Locates and opens the device behind a numeric port identifier.
pub trait PortOpener: Send + Sync + std::fmt::Debug {
    /// Open port `port_number` with the given parameters.
    fn open_port(
        &self,
        port_number: u32,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configuration() {
        let config = PortConfiguration::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.timeout, Duration::from_secs(1));
    }
}
