//! Synchronized read and write paths over the two halves of an open port.
//!
//! Lock order: `reader` before `writer`. Only [`PortIo::install`] and
//! [`PortIo::release`] take both.

use super::handlers::DataSentHandler;
use crate::port::{PortError, SerialPortAdapter};
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Granularity of the read and write retry loops, also the blocking timeout
/// set on both port halves.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Timeouts below this get a single attempt after sleeping the full timeout.
pub const SINGLE_ATTEMPT_THRESHOLD: Duration = Duration::from_millis(10);

const CR: u8 = 0x0D;

type Port = Box<dyn SerialPortAdapter>;

/// Both halves of an open port, as handed back by [`PortIo::release`].
pub(crate) struct PortHalves {
    pub reader: Port,
    pub writer: Port,
}

/// State shared between the transport handle and its receiver thread.
pub(crate) struct PortIo {
    open: AtomicBool,
    default_timeout_ms: AtomicU64,
    read_faulted: AtomicBool,
    reader: Mutex<Option<Port>>,
    writer: Mutex<Option<Port>>,
    port_name: Mutex<Option<String>>,
    on_data_sent: Mutex<Option<DataSentHandler>>,
}

impl PortIo {
    pub fn new() -> Self {
        Self {
            open: AtomicBool::new(false),
            default_timeout_ms: AtomicU64::new(0),
            read_faulted: AtomicBool::new(false),
            reader: Mutex::new(None),
            writer: Mutex::new(None),
            port_name: Mutex::new(None),
            on_data_sent: Mutex::new(None),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms.load(Ordering::Relaxed))
    }

    pub fn port_name(&self) -> Option<String> {
        self.port_name.lock().clone()
    }

    /// Store freshly opened halves and mark the port open.
    pub fn install(
        &self,
        halves: PortHalves,
        default_timeout: Duration,
        on_data_sent: Option<DataSentHandler>,
    ) {
        let mut reader = self.reader.lock();
        let mut writer = self.writer.lock();
        *self.port_name.lock() = Some(halves.writer.name().to_string());
        *self.on_data_sent.lock() = on_data_sent;
        let timeout_ms = u64::try_from(default_timeout.as_millis()).unwrap_or(u64::MAX);
        self.default_timeout_ms.store(timeout_ms, Ordering::Relaxed);
        self.read_faulted.store(false, Ordering::Relaxed);
        *reader = Some(halves.reader);
        *writer = Some(halves.writer);
        self.open.store(true, Ordering::Release);
    }

    /// Mark the port closed and take both halves out.
    ///
    /// The flag is cleared before the locks are taken so a long poll in
    /// progress notices and gives up its lock within one poll interval.
    /// Returns `None` if the port was not open.
    pub fn release(&self) -> Option<PortHalves> {
        self.open.store(false, Ordering::Release);
        let mut reader = self.reader.lock();
        let mut writer = self.writer.lock();
        *self.on_data_sent.lock() = None;
        self.port_name.lock().take();
        match (reader.take(), writer.take()) {
            (Some(reader), Some(writer)) => Some(PortHalves { reader, writer }),
            _ => None,
        }
    }

    /// Read up to `buf.len()` bytes.
    ///
    /// `None` uses the timeout the port was opened with. Returns 0 without
    /// blocking when the port is closed.
    pub fn read(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.read_until(buf, timeout, false)
    }

    /// Like [`PortIo::read`], but finishes once a `\r` or `\n` arrives.
    pub fn read_line(&self, buf: &mut [u8], timeout: Option<Duration>) -> usize {
        self.read_until(buf, timeout, true)
    }

    fn read_until(&self, buf: &mut [u8], timeout: Option<Duration>, stop_at_eol: bool) -> usize {
        if buf.is_empty() || !self.is_open() {
            return 0;
        }
        let timeout = timeout.unwrap_or_else(|| self.default_timeout());

        let mut guard = self.reader.lock();
        let Some(port) = guard.as_mut() else {
            return 0;
        };

        if timeout < SINGLE_ATTEMPT_THRESHOLD {
            thread::sleep(timeout);
            if !self.is_open() {
                return 0;
            }
            let limit = if stop_at_eol { 1 } else { buf.len() };
            return self.attempt(port, &mut buf[..limit]);
        }

        // Byte-at-a-time in line mode so nothing past the terminator is consumed
        let chunk = if stop_at_eol { 1 } else { buf.len() };
        let mut total = 0;
        let mut deadline = deadline_after(timeout);

        while total < buf.len() && self.is_open() {
            let started = Instant::now();
            let end = (total + chunk).min(buf.len());
            let n = self.attempt(port, &mut buf[total..end]);
            if n > 0 {
                let line_done = stop_at_eol
                    && buf[total..total + n]
                        .iter()
                        .any(|b| matches!(b, b'\r' | b'\n'));
                total += n;
                if line_done {
                    break;
                }
                deadline = deadline_after(timeout);
                continue;
            }

            let Some(remaining) = remaining_until(deadline) else {
                break;
            };
            let spent = started.elapsed();
            if spent < POLL_INTERVAL {
                thread::sleep((POLL_INTERVAL - spent).min(remaining));
            }
        }

        if total < buf.len() {
            debug!(requested = buf.len(), received = total, "short read");
        }
        total
    }

    /// One read call against the port; "no data" and hard errors both yield 0.
    fn attempt(&self, port: &mut Port, buf: &mut [u8]) -> usize {
        match port.read_bytes(buf) {
            Ok(n) => {
                if n > 0 {
                    self.read_faulted.store(false, Ordering::Relaxed);
                }
                n
            }
            Err(ref e) if is_no_data(e) => 0,
            Err(e) => {
                // Logged once per fault so a vanished device doesn't flood the log
                if !self.read_faulted.swap(true, Ordering::Relaxed) {
                    warn!(port = port.name(), error = %e, "serial read failed");
                } else {
                    debug!(port = port.name(), error = %e, "serial read failed again");
                }
                0
            }
        }
    }

    /// Write `data` as one write bounded by the open timeout; returns the
    /// count accepted.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() || !self.is_open() {
            return 0;
        }
        let written = {
            let mut guard = self.writer.lock();
            let Some(port) = guard.as_mut() else {
                return 0;
            };
            let deadline = deadline_after(self.default_timeout());
            write_within(port, data, deadline)
        };
        self.notify_sent();
        written
    }

    /// Write `text`, then a carriage return unless `text` already ends with one.
    ///
    /// Payload and terminator go out under one hold of the write lock and
    /// share one timeout.
    pub fn write_line(&self, text: &str) -> usize {
        if text.is_empty() || !self.is_open() {
            return 0;
        }
        let written = {
            let mut guard = self.writer.lock();
            let Some(port) = guard.as_mut() else {
                return 0;
            };
            let deadline = deadline_after(self.default_timeout());
            let bytes = text.as_bytes();
            let mut written = write_within(port, bytes, deadline);
            if bytes.last() != Some(&CR) {
                written += write_within(port, &[CR], deadline);
            }
            written
        };
        self.notify_sent();
        written
    }

    fn notify_sent(&self) {
        let handler = self.on_data_sent.lock().clone();
        if let Some(handler) = handler {
            handler();
        }
    }
}

/// `timeout` from now, or `None` when that lies beyond what `Instant` can hold.
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Time left before `deadline`; `None` once it has passed. No deadline never expires.
fn remaining_until(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        Some(deadline) => {
            let now = Instant::now();
            (now < deadline).then(|| deadline - now)
        }
        None => Some(POLL_INTERVAL),
    }
}

fn is_no_data(e: &PortError) -> bool {
    matches!(
        e,
        PortError::Io(io) if matches!(
            io.kind(),
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
        )
    )
}

/// Hand `data` to the device until it is all accepted or `deadline` passes.
///
/// Each device call blocks for at most [`POLL_INTERVAL`], so `deadline`
/// stands in for the timeout of a single blocking write. At least one call
/// is always made.
fn write_within(port: &mut Port, data: &[u8], deadline: Option<Instant>) -> usize {
    let mut total = 0;
    while total < data.len() {
        let progressed = match port.write_bytes(&data[total..]) {
            Ok(n) => {
                total += n;
                n > 0
            }
            Err(ref e) if is_no_data(e) => false,
            Err(e) => {
                warn!(port = port.name(), error = %e, "serial write failed");
                break;
            }
        };
        if total == data.len() {
            break;
        }
        let Some(remaining) = remaining_until(deadline) else {
            break;
        };
        if !progressed {
            thread::sleep(POLL_INTERVAL.min(remaining));
        }
    }

    if total < data.len() {
        debug!(requested = data.len(), accepted = total, "short write");
    }
    total
}
