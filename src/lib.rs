//! Serial Redirector Library
//!
//! Exposes UARTs as TCP endpoints in one of three modes: `raw` (transparent
//! relay), `telnet` (RFC2217 COM-PORT-CONTROL, remote line settings) and
//! `rawlp` (network to UART only, for printers and similar sinks).
//!
//! # Modules
//!
//! - `config`: Configuration management with TOML support
//! - `port`: UART abstraction (`UartChannel`), serialport backend and mock
//! - `telnet`: Telnet framing and the RFC2217 codec
//! - `queue`: Bounded per-session byte queues
//! - `session`: One connected client and its relay pump
//! - `controller`: Per-port state machine owning the UART and its sessions
//! - `engine`: The cooperative loop driving every port
//! - `control`: Management commands and the `ControlHandle`
//! - `state`: Status snapshots
//! - `error`: Unified error handling
//! - `logging`: Tracing subscriber setup
//! - `rest_api`: REST API handlers (when `rest-api` feature is enabled)

pub mod config;
pub mod control;
pub mod controller;
pub mod engine;
pub mod error;
pub mod logging;
pub mod port;
pub mod queue;
pub mod session;
pub mod state;
pub mod telnet;

#[cfg(feature = "rest-api")]
pub mod rest_api;

// Re-export commonly used types for convenience
pub use control::{ControlError, ControlHandle, SerialUpdate};
pub use controller::PortController;
pub use engine::RedirectorEngine;
pub use error::AppError;
pub use port::{
    DataBits, DeviceFactory, FlowControl, LiveLineParams, MockUart, Parity, StopBits,
    UartChannel, UartError, UartFactory,
};
pub use session::{CloseReason, PortSession, SessionRole};
pub use state::{PortCounters, PortState, PortStatus, SystemStatus};
pub use telnet::{CodecError, FrameCodec};

#[cfg(feature = "rest-api")]
pub use error::AppResult;

// Re-export config types
pub use config::{Config, ConfigError, ConfigLoader, ConfigResult, PortConfig, PortMode};
