//! Tracing subscriber setup driven by the `[logging]` config section.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber, writing to stderr.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(env_filter(config))
        .with_thread_names(true);

    match config.format {
        LogFormat::Json => builder.json().try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
        LogFormat::Pretty => builder.pretty().try_init().is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_configured_level_used_without_rust_log() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Compact,
        };
        assert_eq!(env_filter(&config).to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_bad_level_falls_back_to_info() {
        std::env::remove_var("RUST_LOG");
        let config = LoggingConfig {
            level: "serial_frames=loud".to_string(),
            format: LogFormat::Pretty,
        };
        assert_eq!(env_filter(&config).to_string(), "info");
    }
}
