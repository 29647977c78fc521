//! Port abstraction layer for serial communication.
//!
//! Provides the adapter traits the transport is built on, an implementation
//! over the `serialport` crate, and a mock for tests.

pub mod error;
pub mod mock;
pub mod sync_port;
pub mod traits;

pub use error::{PortError, MAX_PORT_NUMBER, MAX_TIMEOUT};
pub use mock::MockSerialPort;
pub use sync_port::*;
pub use traits::*;
