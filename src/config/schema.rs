//! Configuration schema definitions.
//!
//! This module defines the structure of the configuration file using serde.
//! All configuration sections are defined here with appropriate defaults.

use super::error::{ConfigError, ConfigResult};
use crate::port::{DataBits, FlowControl, LiveLineParams, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP management server
    pub server: ServerConfig,
    /// Redirector loop tuning
    pub engine: EngineConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Redirected ports
    pub ports: Vec<PortConfig>,
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        self.engine.validate()?;

        let mut seen = HashSet::new();
        for (index, port) in self.ports.iter().enumerate() {
            port.validate()
                .map_err(|e| prefix_key(e, &format!("ports[{index}]")))?;
            if !seen.insert(port.tcp_port) {
                return Err(ConfigError::validation(
                    format!("ports[{index}].tcp_port"),
                    format!("TCP port {} is used by more than one port", port.tcp_port),
                ));
            }
        }
        Ok(())
    }
}

fn prefix_key(err: ConfigError, prefix: &str) -> ConfigError {
    match err {
        ConfigError::ValidationError { key, message } => ConfigError::ValidationError {
            key: format!("{prefix}.{key}"),
            message,
        },
        other => other,
    }
}

/// HTTP management server section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Serve the management API at all
    pub enabled: bool,
    /// Host address to bind to
    pub host: String,
    /// Port number for HTTP server
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Redirector loop section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Address every port listener binds to
    pub listen_host: String,
    /// UART polling interval while a session is live
    pub tick_ms: u64,
    /// Capacity of each per-session queue, in bytes
    pub buffer_size: usize,
    /// Close sessions blocked this long by back-pressure (0 disables)
    pub backpressure_watchdog_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            tick_ms: 5,
            buffer_size: 1024,
            backpressure_watchdog_ms: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn watchdog(&self) -> Option<Duration> {
        (self.backpressure_watchdog_ms > 0)
            .then(|| Duration::from_millis(self.backpressure_watchdog_ms))
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.buffer_size < 16 {
            return Err(ConfigError::validation(
                "engine.buffer_size",
                "must be at least 16 bytes",
            ));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::validation("engine.tick_ms", "must be positive"));
        }
        Ok(())
    }
}

/// How a port relays bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    /// RFC2217 telnet with remote line configuration
    Telnet,
    /// Unfiltered bidirectional relay
    Raw,
    /// Line printer: network to UART only
    Rawlp,
}

impl PortMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telnet => "telnet",
            Self::Raw => "raw",
            Self::Rawlp => "rawlp",
        }
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telnet" => Ok(Self::Telnet),
            "raw" => Ok(Self::Raw),
            "rawlp" => Ok(Self::Rawlp),
            other => Err(format!("unknown mode {other:?} (expected telnet, raw or rawlp)")),
        }
    }
}

/// One redirected port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Stable identifier for management clients; defaults to list position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port_id: Option<u32>,
    pub tcp_port: u16,
    /// Device path, or `loop://` for a software loopback
    pub uart: String,
    #[serde(default = "unrouted_pin")]
    pub tx_pin: i32,
    #[serde(default = "unrouted_pin")]
    pub rx_pin: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rts_pin: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cts_pin: Option<i32>,
    #[serde(default = "default_mode")]
    pub mode: PortMode,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_data_bits")]
    pub data_bits: DataBits,
    #[serde(default = "default_parity")]
    pub parity: Parity,
    #[serde(default = "default_stop_bits")]
    pub stop_bits: StopBits,
    #[serde(default = "default_flow_control")]
    pub flow_control: FlowControl,
    /// Close sessions idle this long (0 disables)
    #[serde(default)]
    pub idle_timeout_ms: u64,
    /// Extra read-only telnet sessions allowed next to the primary one
    #[serde(default)]
    pub max_monitors: usize,
}

fn unrouted_pin() -> i32 {
    -1
}
fn default_mode() -> PortMode {
    PortMode::Telnet
}
fn default_true() -> bool {
    true
}
fn default_baud() -> u32 {
    115_200
}
fn default_data_bits() -> DataBits {
    DataBits::Eight
}
fn default_parity() -> Parity {
    Parity::None
}
fn default_stop_bits() -> StopBits {
    StopBits::One
}
fn default_flow_control() -> FlowControl {
    FlowControl::None
}

impl PortConfig {
    /// A telnet port at 115200 8N1 with no idle timeout.
    pub fn new(tcp_port: u16, uart: impl Into<String>) -> Self {
        Self {
            port_id: None,
            tcp_port,
            uart: uart.into(),
            tx_pin: unrouted_pin(),
            rx_pin: unrouted_pin(),
            rts_pin: None,
            cts_pin: None,
            mode: default_mode(),
            enabled: true,
            baud: default_baud(),
            data_bits: default_data_bits(),
            parity: default_parity(),
            stop_bits: default_stop_bits(),
            flow_control: default_flow_control(),
            idle_timeout_ms: 0,
            max_monitors: 0,
        }
    }

    pub fn with_mode(mut self, mode: PortMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn line_params(&self) -> LiveLineParams {
        LiveLineParams {
            baud: self.baud,
            data_bits: self.data_bits,
            parity: self.parity,
            stop_bits: self.stop_bits,
            flow_control: self.flow_control,
        }
    }

    pub fn set_line_params(&mut self, params: LiveLineParams) {
        self.baud = params.baud;
        self.data_bits = params.data_bits;
        self.parity = params.parity;
        self.stop_bits = params.stop_bits;
        self.flow_control = params.flow_control;
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }

    /// Field-level checks; keys are relative to this port.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tcp_port == 0 {
            return Err(ConfigError::validation("tcp_port", "must be between 1 and 65535"));
        }
        if self.uart.trim().is_empty() {
            return Err(ConfigError::validation("uart", "device identifier is empty"));
        }
        if self.baud == 0 {
            return Err(ConfigError::validation("baud", "must be positive"));
        }
        for (key, pin) in [
            ("tx_pin", Some(self.tx_pin)),
            ("rx_pin", Some(self.rx_pin)),
            ("rts_pin", self.rts_pin),
            ("cts_pin", self.cts_pin),
        ] {
            if matches!(pin, Some(p) if p < -1) {
                return Err(ConfigError::validation(key, "pin must be -1 or a GPIO number"));
            }
        }
        if self.flow_control == FlowControl::RtsCts
            && (self.rts_pin == Some(-1) || self.cts_pin == Some(-1))
        {
            return Err(ConfigError::validation(
                "flow_control",
                "rtscts needs rts_pin and cts_pin routed",
            ));
        }
        if self.max_monitors > 0 && self.mode != PortMode::Telnet {
            return Err(ConfigError::validation(
                "max_monitors",
                format!("monitor sessions are only available in telnet mode, not {}", self.mode),
            ));
        }
        Ok(())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset
    pub level: String,
    /// Log format: "json", "pretty", "compact"
    pub format: LogFormat,
    /// Log file path (optional, stderr otherwise)
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
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
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format {other:?}")),
        }
    }
}
