//! serial_frames Library
//!
//! A byte-oriented serial transport with a background receiver, plus a
//! decoder for 4-byte magic-prefixed command frames.
//!
//! # Modules
//!
//! - `port`: Port abstraction layer over OS devices and an in-memory mock
//! - `transport`: Open/close lifecycle, locked reads and writes, receiver thread
//! - `framing`: Command frame decoder fed from received data
//! - `config`: Configuration management with TOML support
//! - `logging`: Tracing subscriber setup

pub mod config;
pub mod framing;
pub mod logging;
pub mod port;
pub mod transport;

// Re-export commonly used types for convenience
pub use framing::{Command, FrameDecoder, FrameState};
pub use port::{MockSerialPort, PortConfiguration, PortError, PortOpener, SerialPortAdapter};
pub use transport::{Handlers, SerialTransport};

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
