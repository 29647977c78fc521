//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_FRAMES";

/// Config file name looked up in the working directory
const LOCAL_CONFIG_FILE_NAME: &str = "serial_frames.toml";

/// Config file name inside the per-user config directory
const CONFIG_FILE_NAME: &str = "config.toml";

/// Per-user config directory name
const APP_DIR_NAME: &str = "serial-frames";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_FRAMES_CONFIG";

/// Configuration loader with resolution and override logic.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Resolved config file path (if any)
    pub config_path: Option<PathBuf>,
    /// The loaded configuration
    pub config: Config,
}

impl ConfigLoader {
    /// Load configuration using standard resolution order.
    ///
    /// Resolution priority (highest to lowest):
    /// 1. `SERIAL_FRAMES_CONFIG` environment variable (explicit path)
    /// 2. `./serial_frames.toml` (current directory)
    /// 3. `<user config dir>/serial-frames/config.toml`
    /// 4. Built-in defaults (no file required)
    ///
    /// Environment variables override file values; the result is validated.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = match config_path {
            Some(ref path) => load_from_file(path)?,
            None => Config::default(),
        };

        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;
        config.validate()?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    ///
    /// Environment overrides are still applied; unparseable ones are ignored.
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        if apply_env_overrides(&mut config).is_err() || config.validate().is_err() {
            config = Config::default();
        }

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Save the current configuration to the file it was loaded from.
    pub fn save(&self) -> ConfigResult<()> {
        let path = self.config_path.as_ref().ok_or(ConfigError::NoPath)?;
        save_to_file(&self.config, path)
    }

    /// Save the current configuration to a specific file.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        save_to_file(&self.config, path.as_ref())
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    let cwd_config = PathBuf::from(LOCAL_CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    get_default_config_path().filter(|p| p.exists())
}

/// Get the platform-specific config directory.
fn get_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var("APPDATA").ok().map(PathBuf::from)
    }

    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                std::env::var("HOME")
                    .ok()
                    .map(|h| PathBuf::from(h).join(".config"))
            })
    }
}

/// Get the default config file path for creating new config files.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::io("read", path, e))?;
    Ok(toml::from_str(&content)?)
}

fn save_to_file(config: &Config, path: &Path) -> ConfigResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::io("write", path, e))?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|e| ConfigError::io("write", path, e))
}

/// Read `SERIAL_FRAMES_<KEY>` and parse it, if set.
fn env_value<T: FromStr>(key: &str, what: &str) -> ConfigResult<Option<T>> {
    let var = format!("{}_{}", ENV_PREFIX, key);
    match std::env::var(&var) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(var, format!("Invalid {what}: '{val}'"))),
        Err(_) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Variables follow the pattern `SERIAL_FRAMES_<SECTION>_<KEY>`, e.g.
/// `SERIAL_FRAMES_SERIAL_BAUD_RATE=115200`. The magic byte also accepts hex
/// (`SERIAL_FRAMES_FRAMING_MAGIC_BYTE=0x38`).
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    if let Some(v) = env_value("SERIAL_PORT_NUMBER", "port number")? {
        config.serial.port_number = v;
    }
    if let Some(v) = env_value("SERIAL_BAUD_RATE", "baud rate")? {
        config.serial.baud_rate = v;
    }
    if let Some(v) = env_value("SERIAL_TIMEOUT_MS", "timeout")? {
        config.serial.timeout_ms = v;
    }
    if let Some(v) = env_value::<String>("SERIAL_DEVICE_PREFIX", "device prefix")? {
        config.serial.device_prefix = v;
    }
    if let Some(v) = env_value("SERIAL_SHUTDOWN_TIMEOUT_MS", "shutdown timeout")? {
        config.serial.shutdown_timeout_ms = v;
    }

    if let Some(v) = env_value::<String>("FRAMING_MAGIC_BYTE", "magic byte")? {
        config.framing.magic_byte = parse_byte(&v).ok_or_else(|| {
            ConfigError::env_parse(
                format!("{}_FRAMING_MAGIC_BYTE", ENV_PREFIX),
                format!("Invalid magic byte: '{v}'"),
            )
        })?;
    }

    if let Some(v) = env_value::<String>("LOGGING_LEVEL", "log level")? {
        config.logging.level = v;
    }
    if let Some(v) = env_value("LOGGING_FORMAT", "log format")? {
        config.logging.format = v;
    }

    Ok(())
}

/// Parse a byte given in decimal or `0x`-prefixed hex.
pub fn parse_byte(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_default_loader() {
        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud_rate, 9600);
        assert!(loader.config_path.is_none());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        env::set_var("SERIAL_FRAMES_SERIAL_BAUD_RATE", "57600");
        env::set_var("SERIAL_FRAMES_FRAMING_MAGIC_BYTE", "0xAA");

        let loader = ConfigLoader::with_defaults();
        assert_eq!(loader.config().serial.baud_rate, 57600);
        assert_eq!(loader.config().framing.magic_byte, 0xAA);

        env::remove_var("SERIAL_FRAMES_SERIAL_BAUD_RATE");
        env::remove_var("SERIAL_FRAMES_FRAMING_MAGIC_BYTE");
    }

    #[test]
    #[serial]
    fn test_invalid_env_override_is_reported() {
        env::set_var("SERIAL_FRAMES_SERIAL_TIMEOUT_MS", "soon");

        let mut config = Config::default();
        let err = apply_env_overrides(&mut config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env { ref var, .. } if var == "SERIAL_FRAMES_SERIAL_TIMEOUT_MS"
        ));

        env::remove_var("SERIAL_FRAMES_SERIAL_TIMEOUT_MS");
    }

    #[test]
    #[serial]
    fn test_load_and_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("serial_frames.toml");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[serial]\nport_number = 7\ntimeout_ms = 250\n").unwrap();

        let loader = ConfigLoader::load_from(&path).unwrap();
        assert_eq!(loader.config().serial.port_number, 7);
        assert_eq!(loader.config().serial.timeout_ms, 250);

        let copy = dir.path().join("copy.toml");
        loader.save_to(&copy).unwrap();
        let reloaded = ConfigLoader::load_from(&copy).unwrap();
        assert_eq!(reloaded.config(), loader.config());
    }

    #[test]
    #[serial]
    fn test_load_rejects_out_of_range_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[serial]\ntimeout_ms = 20000\n").unwrap();

        let err = ConfigLoader::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_save_without_path_fails() {
        let loader = ConfigLoader {
            config_path: None,
            config: Config::default(),
        };
        assert!(matches!(loader.save(), Err(ConfigError::NoPath)));
    }

    #[test]
    fn test_parse_byte() {
        assert_eq!(parse_byte("56"), Some(0x38));
        assert_eq!(parse_byte("0x38"), Some(0x38));
        assert_eq!(parse_byte(" 0XFF "), Some(0xFF));
        assert_eq!(parse_byte("0x100"), None);
        assert_eq!(parse_byte("magic"), None);
    }
}
