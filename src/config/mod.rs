//! Configuration module for serial_frames.
//!
//! TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! 1. `SERIAL_FRAMES_CONFIG` environment variable (explicit path)
//! 2. `./serial_frames.toml` (current directory)
//! 3. `~/.config/serial-frames/config.toml` (XDG on Linux/macOS)
//! 4. `%APPDATA%\serial-frames\config.toml` (Windows)
//! 5. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! The pattern is `SERIAL_FRAMES_<SECTION>_<KEY>`:
//! - `SERIAL_FRAMES_SERIAL_PORT_NUMBER=3`
//! - `SERIAL_FRAMES_SERIAL_DEVICE_PREFIX=/dev/ttyUSB`
//! - `SERIAL_FRAMES_FRAMING_MAGIC_BYTE=0x38`
//! - `SERIAL_FRAMES_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```rust,no_run
//! use serial_frames::config::ConfigLoader;
//!
//! let loader = ConfigLoader::load()?;
//! let config = loader.config();
//! println!("Port: {}{}", config.serial.device_prefix, config.serial.port_number);
//! # Ok::<(), serial_frames::config::ConfigError>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, parse_byte, resolve_config_path, ConfigLoader};
pub use schema::{Config, FramingConfig, LogFormat, LoggingConfig, SerialConfig};
