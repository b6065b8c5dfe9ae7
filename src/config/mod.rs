//! Configuration module for serial-redirector.
//!
//! This module provides TOML-based configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the following locations (in order of priority):
//!
//! 1. `--config <path>` on the command line
//! 2. `SERIAL_REDIRECTOR_CONFIG` environment variable (explicit path)
//! 3. `./redirector.toml` (current directory)
//! 4. `~/.config/serial-redirector/redirector.toml` (XDG on Linux/macOS)
//! 5. `%APPDATA%\serial-redirector\redirector.toml` (Windows)
//! 6. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Server, engine and logging values can be overridden via environment
//! variables following `SERIAL_REDIRECTOR_<SECTION>_<KEY>`:
//! - `SERIAL_REDIRECTOR_SERVER_PORT=8081`
//! - `SERIAL_REDIRECTOR_ENGINE_TICK_MS=2`
//! - `SERIAL_REDIRECTOR_LOGGING_LEVEL=debug`
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 8080
//!
//! [[ports]]
//! tcp_port = 4000
//! uart = "/dev/ttyUSB0"
//! mode = "telnet"
//! baud = 115200
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{get_default_config_path, resolve_config_path, ConfigLoader};
pub use schema::{
    Config, EngineConfig, LogFormat, LoggingConfig, PortConfig, PortMode, ServerConfig,
};
