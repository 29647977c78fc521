//! The serial transport: open/close lifecycle, synchronized I/O and the
//! optional background receiver.
//!
//! ```text
//! application ──write/write_line──> writer half ─┐
//!                                                ├─ one device
//! receiver thread ──read──> reader half ─────────┘
//!        │
//!        └──> DataReceived handler (e.g. a FrameDecoder)
//! ```
//!
//! Reads are serialized against each other and writes against each other,
//! but a read and a write proceed concurrently. Open and close take both
//! locks, read lock first.

mod handlers;
mod io;
mod receiver;

pub use handlers::{DataReceivedHandler, DataSentHandler, Handlers};
pub use io::{POLL_INTERVAL, SINGLE_ATTEMPT_THRESHOLD};
pub use receiver::{RECEIVE_BUFFER_SIZE, RECEIVE_POLL_TIMEOUT};

use crate::config::SerialConfig;
use crate::port::{
    PortConfiguration, PortError, PortOpener, SystemPortOpener, MAX_PORT_NUMBER, MAX_TIMEOUT,
};
use io::{PortHalves, PortIo};
use parking_lot::Mutex;
use receiver::{Receiver, ReceiverSignal};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for [`SerialTransport::open`] callers without a preference.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Default timeout for [`SerialTransport::open_async`] callers without a preference.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_millis(100);

/// How long close waits for the receiver thread by default.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// A byte-oriented serial transport.
///
/// Each instance owns its own port, locks and handlers; any number of
/// transports can be used side by side. All methods take `&self`, so a
/// transport can be shared between threads behind an `Arc`.
///
/// ```
/// use serial_frames::port::MockSerialPort;
/// use serial_frames::SerialTransport;
/// use std::time::Duration;
///
/// let device = MockSerialPort::new("MOCK3");
/// let transport = SerialTransport::with_opener(device.clone());
/// transport.open(3, 9600, Duration::from_millis(500))?;
///
/// assert_eq!(transport.write_line("050010"), 7);
/// assert_eq!(device.written_bytes(), b"050010\r");
///
/// transport.close()?;
/// assert!(!transport.is_open());
/// # Ok::<(), serial_frames::PortError>(())
/// ```
pub struct SerialTransport {
    opener: Box<dyn PortOpener>,
    io: Arc<PortIo>,
    signal: Arc<ReceiverSignal>,
    /// Held across open and close; also owns the current receiver.
    lifecycle: Mutex<Option<Receiver>>,
    shutdown_timeout: Duration,
}

impl SerialTransport {
    /// A transport over OS serial devices with the platform's default naming.
    pub fn new() -> Self {
        Self::with_opener(SystemPortOpener::default())
    }

    /// A transport that opens ports through `opener`.
    pub fn with_opener(opener: impl PortOpener + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            io: Arc::new(PortIo::new()),
            signal: Arc::new(ReceiverSignal::default()),
            lifecycle: Mutex::new(None),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// A transport configured from the `[serial]` config section.
    pub fn from_config(config: &SerialConfig) -> Self {
        Self::with_opener(SystemPortOpener::new(config.device_prefix.clone()))
            .with_shutdown_timeout(config.shutdown_timeout())
    }

    /// Change how long [`SerialTransport::close`] waits for the receiver.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Open port `port_number` for synchronous use.
    ///
    /// `timeout` becomes the default for reads that don't pass their own
    /// and the blocking limit of writes.
    ///
    /// # Errors
    ///
    /// - `InvalidPortNumber` / `TimeoutOutOfRange` before any device is touched
    /// - `AlreadyOpen` if this transport is open
    /// - `NotFound`, `Config`, `Serial` or `Io` if the device can't be acquired
    pub fn open(
        &self,
        port_number: u32,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<(), PortError> {
        self.open_with(port_number, baud_rate, timeout, Handlers::new())
    }

    /// Open port `port_number` and start the background receiver if any
    /// handler is set.
    ///
    /// # Errors
    ///
    /// As [`SerialTransport::open`], plus `ReceiverAlreadyRunning` when a
    /// receiver from an earlier session never stopped.
    pub fn open_async(
        &self,
        port_number: u32,
        baud_rate: u32,
        handlers: Handlers,
        timeout: Duration,
    ) -> Result<(), PortError> {
        self.open_with(port_number, baud_rate, timeout, handlers)
    }

    fn open_with(
        &self,
        port_number: u32,
        baud_rate: u32,
        timeout: Duration,
        handlers: Handlers,
    ) -> Result<(), PortError> {
        validate_open(port_number, timeout)?;

        let mut lifecycle = self.lifecycle.lock();
        if self.io.is_open() {
            return Err(PortError::AlreadyOpen);
        }
        // Left behind when a handler closed the port from the receiver thread
        if let Some(stale) = lifecycle.take() {
            stale.stop(self.shutdown_timeout)?;
        }
        let wants_receiver = !handlers.is_empty();
        if wants_receiver && self.signal.is_running() {
            return Err(PortError::ReceiverAlreadyRunning);
        }

        let config = PortConfiguration { baud_rate, timeout };
        let mut writer = self.opener.open_port(port_number, &config)?;
        // Some platforms share comm timeouts between duplicated handles, so
        // both halves get the poll interval and `timeout` is enforced by the
        // read and write loops.
        writer.set_timeout(io::POLL_INTERVAL)?;
        let mut reader = writer.try_clone_adapter()?;
        reader.set_timeout(io::POLL_INTERVAL)?;
        let port_name = writer.name().to_string();

        let Handlers {
            on_data_received,
            on_data_sent,
        } = handlers;
        self.io
            .install(PortHalves { reader, writer }, timeout, on_data_sent);
        info!(
            port = %port_name,
            baud_rate,
            timeout_ms = timeout.as_millis() as u64,
            "serial port opened"
        );

        if wants_receiver {
            let spawned = Receiver::spawn(
                Arc::clone(&self.io),
                Arc::clone(&self.signal),
                on_data_received,
                &port_name,
            );
            match spawned {
                Ok(receiver) => *lifecycle = Some(receiver),
                Err(e) => {
                    drop(self.io.release());
                    warn!(port = %port_name, error = %e, "receiver failed to start; port closed");
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Close the port, stopping the receiver first.
    ///
    /// Closing a closed transport is a no-op. The port is marked closed
    /// before the receiver is waited for, so the receiver sees the close on
    /// its next poll.
    ///
    /// # Errors
    ///
    /// `ShutdownTimeout` if the receiver is still running after the shutdown
    /// window. The port is closed regardless.
    pub fn close(&self) -> Result<(), PortError> {
        if self.signal.is_worker_thread() {
            // From a handler: waiting here would wait on ourselves
            if let Some(halves) = self.io.release() {
                info!(port = halves.writer.name(), "serial port closed from receiver");
            }
            return Ok(());
        }

        let mut lifecycle = self.lifecycle.lock();
        let released = self.io.release();
        let stopped = match lifecycle.take() {
            Some(receiver) => receiver.stop(self.shutdown_timeout),
            None => Ok(()),
        };

        if let Some(halves) = released {
            info!(port = halves.writer.name(), "serial port closed");
            drop(halves);
        } else {
            debug!("close on a closed transport");
        }
        stopped
    }

    /// Whether the port is open. Never blocks.
    pub fn is_open(&self) -> bool {
        self.io.is_open()
    }

    /// Whether a receiver thread is alive for this transport.
    pub fn has_receiver(&self) -> bool {
        self.signal.is_running()
    }

    /// The timeout the port was opened with.
    pub fn max_timeout(&self) -> Duration {
        self.io.default_timeout()
    }

    /// Name of the open device, if any.
    pub fn port_name(&self) -> Option<String> {
        self.io.port_name()
    }

    /// Read up to `buf.len()` bytes, waiting at most `timeout` for each new
    /// byte (`None` = the open timeout).
    ///
    /// Returns the number of bytes read; fewer than requested on timeout and
    /// 0 on a closed transport.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.io.read(buf, timeout)
    }

    /// Read until a `\r` or `\n` has arrived, the buffer is full, or the
    /// timeout elapses. The terminator is kept in `buf` and counted.
    pub fn read_line(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.io.read_line(buf, timeout)
    }

    /// Write `data`, blocking at most the open timeout; returns the count the
    /// port accepted.
    pub fn write(&self, data: &[u8]) -> usize {
        self.io.write(data)
    }

    /// Write `text` followed by `\r` unless it already ends with one.
    pub fn write_line(&self, text: &str) -> usize {
        self.io.write_line(text)
    }
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "serial transport dropped uncleanly");
        }
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("open", &self.is_open())
            .field("port", &self.port_name())
            .field("receiver", &self.has_receiver())
            .finish()
    }
}

fn validate_open(port_number: u32, timeout: Duration) -> Result<(), PortError> {
    if port_number > MAX_PORT_NUMBER {
        debug!(port_number, "rejecting port number");
        return Err(PortError::InvalidPortNumber(port_number));
    }
    if timeout > MAX_TIMEOUT {
        debug!(?timeout, "rejecting timeout");
        return Err(PortError::TimeoutOutOfRange(timeout));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::MockSerialPort;

    #[test]
    fn test_validation_happens_before_opening() {
        let device = MockSerialPort::new("MOCK0");
        let transport = SerialTransport::with_opener(device.clone());

        let err = transport.open(256, 9600, DEFAULT_TIMEOUT).unwrap_err();
        assert!(matches!(err, PortError::InvalidPortNumber(256)));

        let err = transport
            .open(1, 9600, Duration::from_millis(15_001))
            .unwrap_err();
        assert!(matches!(err, PortError::TimeoutOutOfRange(_)));

        assert_eq!(device.open_count(), 0);
        assert!(!transport.is_open());
    }

    #[test]
    fn test_reader_half_polls_at_interval() {
        let device = MockSerialPort::new("MOCK0");
        let transport = SerialTransport::with_opener(device.clone());
        transport.open(0, 19_200, Duration::from_millis(300)).unwrap();

        let config = device.last_config().unwrap();
        assert_eq!(config.baud_rate, 19_200);
        assert_eq!(config.timeout, Duration::from_millis(300));
        // The device itself polls; the open timeout lives in the transport
        assert_eq!(device.timeout(), POLL_INTERVAL);
        assert_eq!(transport.max_timeout(), Duration::from_millis(300));
    }

    #[test]
    fn test_open_twice_is_rejected() {
        let device = MockSerialPort::new("MOCK0");
        let transport = SerialTransport::with_opener(device.clone());
        transport.open(0, 9600, DEFAULT_TIMEOUT).unwrap();

        assert!(matches!(
            transport.open(0, 9600, DEFAULT_TIMEOUT),
            Err(PortError::AlreadyOpen)
        ));
        assert_eq!(device.open_count(), 1);
    }

    #[test]
    fn test_sync_open_starts_no_receiver() {
        let transport = SerialTransport::with_opener(MockSerialPort::new("MOCK0"));
        transport.open(0, 9600, DEFAULT_TIMEOUT).unwrap();
        assert!(!transport.has_receiver());
    }

    #[test]
    fn test_debug_output() {
        let transport = SerialTransport::with_opener(MockSerialPort::new("MOCK5"));
        transport.open(5, 9600, DEFAULT_TIMEOUT).unwrap();
        let text = format!("{transport:?}");
        assert!(text.contains("open: true"));
        assert!(text.contains("MOCK5"));
    }
}
