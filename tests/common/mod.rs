//! Shared test utilities for transport tests.
//!
//! - Mock-backed transports
//! - Decoders that collect their commands
//! - Polling helpers for conditions reached on the receiver thread

#![allow(dead_code)]

use serial_frames::framing::{Command, FrameDecoder};
use serial_frames::port::MockSerialPort;
use serial_frames::SerialTransport;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Commands collected by a decoder, shared with the test body.
pub type CommandLog = Arc<Mutex<Vec<Command>>>;

/// A mock device and a transport that opens it.
pub fn mock_transport(port_name: &str) -> (MockSerialPort, SerialTransport) {
    let device = MockSerialPort::new(port_name);
    let transport = SerialTransport::with_opener(device.clone());
    (device, transport)
}

/// A decoder that appends every command to the returned log.
pub fn collecting_decoder() -> (FrameDecoder, CommandLog) {
    let log: CommandLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let decoder = FrameDecoder::new().on_command(move |command| sink.lock().unwrap().push(command));
    (decoder, log)
}

/// Poll `condition` every few milliseconds until it holds or `within` elapses.
pub fn wait_for(within: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + within;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}
