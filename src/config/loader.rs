//! Configuration loader with file resolution and environment override support.

use super::error::{ConfigError, ConfigResult};
use super::schema::Config;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "SERIAL_REDIRECTOR";

/// Config file name
const CONFIG_FILE_NAME: &str = "redirector.toml";

/// Directory under the platform config dir
const APP_DIR_NAME: &str = "serial-redirector";

/// Environment variable for explicit config path
const CONFIG_PATH_ENV: &str = "SERIAL_REDIRECTOR_CONFIG";

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
    /// 1. `SERIAL_REDIRECTOR_CONFIG` environment variable (explicit path)
    /// 2. `./redirector.toml` (current directory)
    /// 3. `~/.config/serial-redirector/redirector.toml` (XDG on Linux/macOS)
    /// 4. `%APPDATA%\serial-redirector\redirector.toml` (Windows)
    /// 5. Built-in defaults (no file required)
    ///
    /// Environment variables can override any file value in the
    /// `server`, `engine` and `logging` sections.
    pub fn load() -> ConfigResult<Self> {
        let config_path = resolve_config_path();

        let mut config = if let Some(ref path) = config_path {
            load_from_file(path)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config)?;

        Ok(Self { config_path, config })
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }
        let mut config = load_from_file(&path)?;
        apply_env_overrides(&mut config)?;

        Ok(Self {
            config_path: Some(path),
            config,
        })
    }

    /// Create a loader with default configuration (no file).
    pub fn with_defaults() -> Self {
        let mut config = Config::default();
        // Still apply env overrides even with defaults
        let _ = apply_env_overrides(&mut config);

        Self {
            config_path: None,
            config,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a mutable reference to the configuration.
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&self.config)?)
    }
}

/// Resolve the configuration file path using standard locations.
pub fn resolve_config_path() -> Option<PathBuf> {
    // 1. Explicit environment variable
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    // 2. Current directory
    let cwd_config = PathBuf::from(CONFIG_FILE_NAME);
    if cwd_config.exists() {
        return Some(cwd_config);
    }

    // 3. XDG config directory (Linux/macOS) or APPDATA (Windows)
    if let Some(app_config) = get_default_config_path() {
        if app_config.exists() {
            return Some(app_config);
        }
    }

    None
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

/// Get the default config file path under the platform config directory.
pub fn get_default_config_path() -> Option<PathBuf> {
    get_config_dir().map(|d| d.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// Load configuration from a file.
fn load_from_file(path: &Path) -> ConfigResult<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

fn env_var(suffix: &str) -> (String, Option<String>) {
    let name = format!("{ENV_PREFIX}_{suffix}");
    let value = std::env::var(&name).ok();
    (name, value)
}

fn parse_env<T: FromStr>(suffix: &str, what: &str) -> ConfigResult<Option<T>> {
    match env_var(suffix) {
        (name, Some(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::env_parse(name, format!("Invalid {what}"))),
        (_, None) => Ok(None),
    }
}

/// Apply environment variable overrides to the configuration.
///
/// Environment variables follow the pattern: `SERIAL_REDIRECTOR_<SECTION>_<KEY>`
/// For example:
/// - `SERIAL_REDIRECTOR_SERVER_PORT=8081`
/// - `SERIAL_REDIRECTOR_ENGINE_BUFFER_SIZE=4096`
/// - `SERIAL_REDIRECTOR_LOGGING_FORMAT=json`
fn apply_env_overrides(config: &mut Config) -> ConfigResult<()> {
    // Server overrides
    if let (_, Some(val)) = env_var("SERVER_HOST") {
        config.server.host = val;
    }
    if let Some(port) = parse_env("SERVER_PORT", "port number")? {
        config.server.port = port;
    }
    if let (name, Some(val)) = env_var("SERVER_ENABLED") {
        config.server.enabled = parse_bool(&name, &val)?;
    }

    // Engine overrides
    if let (_, Some(val)) = env_var("ENGINE_LISTEN_HOST") {
        config.engine.listen_host = val;
    }
    if let Some(tick) = parse_env("ENGINE_TICK_MS", "tick interval")? {
        config.engine.tick_ms = tick;
    }
    if let Some(size) = parse_env("ENGINE_BUFFER_SIZE", "buffer size")? {
        config.engine.buffer_size = size;
    }
    if let Some(ms) = parse_env("ENGINE_BACKPRESSURE_WATCHDOG_MS", "watchdog interval")? {
        config.engine.backpressure_watchdog_ms = ms;
    }

    // Logging overrides
    if let (_, Some(val)) = env_var("LOGGING_LEVEL") {
        config.logging.level = val;
    }
    if let Some(format) = parse_env("LOGGING_FORMAT", "log format")? {
        config.logging.format = format;
    }

    Ok(())
}

fn parse_bool(name: &str, val: &str) -> ConfigResult<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse(name, "Expected a boolean")),
    }
}
