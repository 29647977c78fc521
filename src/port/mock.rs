//! Mock serial port implementation for testing.
//!
//! Provides a `MockSerialPort` that simulates serial port behavior without
//! requiring actual hardware. Clones share one device state, which is what
//! lets a single mock serve as both the reader and the writer half of a
//! transport, and as the [`PortOpener`] that hands those halves out.

use super::error::PortError;
use super::traits::{PortConfiguration, PortOpener, SerialPortAdapter};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Inner state of the mock port, shared by every clone.
#[derive(Debug, Default)]
struct MockPortState {
    /// Queue of bytes to be returned by read operations.
    read_queue: VecDeque<u8>,
    /// Log of all bytes written to the port, one entry per write call.
    write_log: Vec<Vec<u8>>,
    /// Whether the next operation should time out.
    should_timeout: bool,
    /// Configured timeout duration.
    timeout: Duration,
    /// Upper bound on bytes accepted by a single write.
    write_limit: Option<usize>,
    /// Whether every write times out until cleared.
    write_stalled: bool,
    /// Whether `open_port` should fail.
    unavailable: bool,
    /// Number of successful `open_port` calls.
    open_count: usize,
    /// Parameters passed to the most recent `open_port`.
    last_config: Option<PortConfiguration>,
}

/// Mock serial port implementation for testing.
///
/// # Example
/// ```
/// use serial_frames::port::{MockSerialPort, SerialPortAdapter};
///
/// let mut port = MockSerialPort::new("MOCK0");
/// port.enqueue_read(b"Hello");
///
/// let mut buffer = [0u8; 5];
/// let n = port.read_bytes(&mut buffer).unwrap();
/// assert_eq!(&buffer[..n], b"Hello");
///
/// port.write_bytes(b"Response").unwrap();
/// assert_eq!(port.get_write_log(), vec![b"Response".to_vec()]);
/// ```
#[derive(Clone)]
pub struct MockSerialPort {
    /// The port name/identifier.
    name: String,
    state: Arc<Mutex<MockPortState>>,
}

impl MockSerialPort {
    /// Create a new mock serial port with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockPortState {
                timeout: Duration::from_secs(1),
                ..Default::default()
            })),
        }
    }

    /// Enqueue bytes to be returned by subsequent read operations.
    pub fn enqueue_read(&self, data: &[u8]) {
        self.state.lock().read_queue.extend(data);
    }

    /// Get a copy of all data written to the port, one entry per write.
    pub fn get_write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All written bytes concatenated in write order.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    /// Clear the write log.
    pub fn clear_write_log(&self) {
        self.state.lock().write_log.clear();
    }

    /// Set whether the next read/write operation should time out.
    pub fn set_should_timeout(&self, should_timeout: bool) {
        self.state.lock().should_timeout = should_timeout;
    }

    /// Accept at most `limit` bytes per write call (`None` = unlimited).
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.state.lock().write_limit = limit;
    }

    /// Make every write time out until cleared, as a device holding off the sender would.
    pub fn set_write_stalled(&self, stalled: bool) {
        self.state.lock().write_stalled = stalled;
    }

    /// Make subsequent `open_port` calls fail as if the device were missing.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Number of times this mock has been opened through [`PortOpener`].
    pub fn open_count(&self) -> usize {
        self.state.lock().open_count
    }

    /// Parameters of the most recent successful open.
    pub fn last_config(&self) -> Option<PortConfiguration> {
        self.state.lock().last_config
    }

    /// The most recently configured timeout.
    pub fn timeout(&self) -> Duration {
        self.state.lock().timeout
    }

    /// Get the number of bytes available to read.
    pub fn available_bytes(&self) -> usize {
        self.state.lock().read_queue.len()
    }
}

impl SerialPortAdapter for MockSerialPort {
    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("write timed out after {:?}", state.timeout),
            )));
        }

        if state.write_stalled {
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "write stalled",
            )));
        }

        let accepted = state.write_limit.map_or(data.len(), |l| l.min(data.len()));
        state.write_log.push(data[..accepted].to_vec());
        Ok(accepted)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let mut state = self.state.lock();

        if state.should_timeout {
            state.should_timeout = false;
            return Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("read timed out after {:?}", state.timeout),
            )));
        }

        let mut bytes_read = 0;
        for byte in buffer.iter_mut() {
            match state.read_queue.pop_front() {
                Some(queued) => {
                    *byte = queued;
                    bytes_read += 1;
                }
                None => break,
            }
        }

        if bytes_read == 0 {
            // Same shape as a non-blocking port with nothing pending
            Err(PortError::Io(std::io::Error::new(
                std::io::ErrorKind::WouldBlock,
                "No data available",
            )))
        } else {
            Ok(bytes_read)
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), PortError> {
        self.state.lock().timeout = timeout;
        Ok(())
    }

    fn try_clone_adapter(&self) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        Ok(Box::new(self.clone()))
    }
}

impl PortOpener for MockSerialPort {
    fn open_port(
        &self,
        _port_number: u32,
        config: &PortConfiguration,
    ) -> Result<Box<dyn SerialPortAdapter>, PortError> {
        let mut state = self.state.lock();
        if state.unavailable {
            return Err(PortError::not_found(self.name.clone()));
        }
        state.open_count += 1;
        state.last_config = Some(*config);
        state.timeout = config.timeout;
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
