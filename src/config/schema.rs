//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::framing::DEFAULT_MAGIC_BYTE;
use crate::port::{DEFAULT_DEVICE_PREFIX, MAX_PORT_NUMBER, MAX_TIMEOUT};
use crate::transport::{DEFAULT_ASYNC_TIMEOUT, DEFAULT_SHUTDOWN_TIMEOUT};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial port configuration
    pub serial: SerialConfig,
    /// Frame decoding configuration
    pub framing: FramingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Check values against the limits the transport enforces at open.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.serial.port_number > MAX_PORT_NUMBER {
            return Err(ConfigError::validation(
                "serial.port_number",
                format!("{} is above {}", self.serial.port_number, MAX_PORT_NUMBER),
            ));
        }
        if self.serial.timeout() > MAX_TIMEOUT {
            return Err(ConfigError::validation(
                "serial.timeout_ms",
                format!(
                    "{} exceeds the maximum of {}",
                    self.serial.timeout_ms,
                    MAX_TIMEOUT.as_millis()
                ),
            ));
        }
        if self.serial.baud_rate == 0 {
            return Err(ConfigError::validation("serial.baud_rate", "must be non-zero"));
        }
        if self.serial.device_prefix.is_empty() {
            return Err(ConfigError::validation("serial.device_prefix", "must not be empty"));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Port number, appended to `device_prefix` to form the device path
    pub port_number: u32,
    /// Line speed
    pub baud_rate: u32,
    /// Per-operation timeout in milliseconds (at most 15000)
    pub timeout_ms: u64,
    /// Device path prefix, e.g. "COM" or "/dev/ttyUSB"
    pub device_prefix: String,
    /// How long close waits for the receiver thread, in milliseconds
    pub shutdown_timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_number: 0,
            baud_rate: 9600,
            timeout_ms: DEFAULT_ASYNC_TIMEOUT.as_millis() as u64,
            device_prefix: DEFAULT_DEVICE_PREFIX.to_string(),
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT.as_millis() as u64,
        }
    }
}

impl SerialConfig {
    /// Get the per-operation timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Get the receiver shutdown window as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Frame decoding configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Frame start marker
    pub magic_byte: u8,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            magic_byte: DEFAULT_MAGIC_BYTE,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format
    Json,
    /// Pretty format with colors
    #[default]
    Pretty,
    /// Compact format
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}
