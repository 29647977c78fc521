//! Synchronous serial port implementation.
//!
//! Wraps the `serialport` crate's `SerialPort` trait with our own `SerialPortAdapter`
//! trait for dependency injection and testing.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use std::io::{Read, Write};
use std::time::Duration;

/// Device name prefix used when none is configured.
#[cfg(windows)]
pub const DEFAULT_DEVICE_PREFIX: &str = "COM";

/// Device name prefix used when none is configured.
#[cfg(not(windows))]
pub const DEFAULT_DEVICE_PREFIX: &str = "/dev/ttyS";

/// Synchronous serial port implementation wrapping `serialport::SerialPort`.
pub struct SyncSerialPort {
    /// The underlying serial port implementation.
    port: Box<dyn serialport::SerialPort>,
    /// The port name/path for identification.
    name: String,
}

impl SyncSerialPort {
    /// Open a serial port at 8N1 with the given line speed and timeout.
    ///
    /// # Example
    /// ```no_run
    /// use serial_frames::port::{PortConfiguration, SyncSerialPort};
    ///
    /// let port = SyncSerialPort::open("/dev/ttyUSB0", &PortConfiguration::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(port_name: &str, config: &PortConfiguration) -> Result<Self, PortError> {
        let port = serialport::new(port_name, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .flow_control(serialport::FlowControl::None)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(config.timeout)
            .open()
            .map_err(|e| PortError::from_open(port_name, e))?;

        Ok(Self {
            port,
            name: port_name.to_string(),
        })
    }
}

impl SerialPortAdapter for SyncSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        self.port.write(data).map_err(PortError::Io)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        self.port.read(buffer).map_err(PortError::Io)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.port.set_timeout(timeout).map_err(PortError::Serial)
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = self.port.try_clone().map_err(PortError::Serial)?;
        Ok(Box::new(Self {
            port,
            name: self.name.clone(),
        }))
    }
}

impl std::fmt::Debug for SyncSerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncSerialPort")
            .field("name", &self.name)
            .field("baud_rate", &self.port.baud_rate())
            .finish()
    }
}

/// Opens OS serial devices named `<device_prefix><port_number>`.
#[derive(Debug, Clone)]
pub struct SystemPortOpener {
    device_prefix: String,
}

impl SystemPortOpener {
    /// Create an opener using a custom device prefix such as `/dev/ttyUSB`.
    pub fn new(device_prefix: impl Into<String>) -> Self {
        Self {
            device_prefix: device_prefix.into(),
        }
    }

    /// The device path port `port_number` resolves to.
    pub fn device_name(&self, port_number: u32) -> String {
        format!("{}{}", self.device_prefix, port_number)
    }
}

impl Default for SystemPortOpener {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PREFIX)
    }
}

impl PortOpener for SystemPortOpener {
    fn open_port(
        &self,
        port_number: u32,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let port = SyncSerialPort::open(&self.device_name(port_number), config)?;
        Ok(Box::new(port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_not_found_error() {
        let config = PortConfiguration::default();
        let result = SyncSerialPort::open("/dev/nonexistent_port_12345", &config);

        match result {
            Err(PortError::NotFound(name)) => assert!(name.contains("nonexistent")),
            Err(other) => panic!("Expected NotFound error, got: {:?}", other),
            Ok(port) => panic!("Unexpectedly opened {:?}", port),
        }
    }

    #[test]
    fn test_device_naming() {
        let opener = SystemPortOpener::new("/dev/ttyUSB");
        assert_eq!(opener.device_name(0), "/dev/ttyUSB0");
        assert_eq!(opener.device_name(17), "/dev/ttyUSB17");

        let default = SystemPortOpener::default();
        assert!(default.device_name(3).starts_with(DEFAULT_DEVICE_PREFIX));
    }
}
