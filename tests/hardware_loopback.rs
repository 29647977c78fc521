//! Loopback tests against a real serial device.
//!
//! Requires the `hardware-tests` feature and a port whose TX is wired to its
//! RX. Configure with:
//! - `TEST_PORT`: port number (appended to the platform device prefix)
//! - `TEST_BAUD`: baud rate (default 9600)
//!
//! ```bash
//! TEST_PORT=0 cargo test --features hardware-tests --test hardware_loopback
//! ```

#![cfg(feature = "hardware-tests")]

use serial_frames::framing::{Command, FrameDecoder};
use serial_frames::transport::Handlers;
use serial_frames::SerialTransport;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

fn test_port() -> Option<(u32, u32)> {
    let port = std::env::var("TEST_PORT").ok()?.parse().ok()?;
    let baud = std::env::var("TEST_BAUD")
        .ok()
        .and_then(|b| b.parse().ok())
        .unwrap_or(9600);
    Some((port, baud))
}

#[test]
fn test_line_loopback() {
    let Some((port, baud)) = test_port() else {
        eprintln!("TEST_PORT not set; skipping");
        return;
    };

    let transport = SerialTransport::new();
    transport.open(port, baud, Duration::from_millis(500)).unwrap();

    assert_eq!(transport.write_line("050010"), 7);
    let mut buf = [0u8; 16];
    let n = transport.read_line(&mut buf, None);
    assert_eq!(&buf[..n], b"050010\r");

    transport.close().unwrap();
}

#[test]
fn test_frame_loopback() {
    let Some((port, baud)) = test_port() else {
        eprintln!("TEST_PORT not set; skipping");
        return;
    };

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let decoder = FrameDecoder::new().on_command(move |c| sink.lock().unwrap().push(c));

    let transport = SerialTransport::new();
    transport
        .open_async(
            port,
            baud,
            Handlers::new().on_data_received(decoder.into_data_handler()),
            Duration::from_millis(100),
        )
        .unwrap();

    let command = Command::new(5, 0, 16);
    assert_eq!(transport.write(&command.to_frame(0x38)), 4);

    let deadline = Instant::now() + Duration::from_secs(2);
    while events.lock().unwrap().is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(*events.lock().unwrap(), vec![command]);

    transport.close().unwrap();
}
