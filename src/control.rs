//! Management contract between the engine and its operators.
//!
//! A [`ControlHandle`] is the only way other tasks (REST handlers, signal
//! handlers, tests) reach the engine. Reads come from the last published
//! snapshot; writes are commands queued to the engine loop and answered over
//! a oneshot channel once applied.

use crate::config::{PortConfig, PortMode};
use crate::port::{DataBits, FlowControl, Parity, StopBits, UartError};
use crate::state::{EngineSnapshot, PortStatus, SystemStatus};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

/// Errors returned by management commands.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("no port is listening on TCP port {0}")]
    UnknownPort(u16),

    #[error("TCP port {0} is already configured")]
    PortExists(u16),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("UART error: {0}")]
    Uart(#[from] UartError),

    #[error("failed to bind TCP port {tcp_port}: {source}")]
    Bind {
        tcp_port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("the redirector engine is not running")]
    EngineStopped,
}

/// Partial change to a port's serial settings.
///
/// Absent fields keep their current value. The new settings become the
/// port's configured defaults; they reach the UART at once when no session is
/// live or `apply_active` is set, otherwise at the next session admission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialUpdate {
    pub baud: Option<u32>,
    pub data_bits: Option<DataBits>,
    pub parity: Option<Parity>,
    pub stop_bits: Option<StopBits>,
    pub flow_control: Option<FlowControl>,
    pub idle_timeout_ms: Option<u64>,
    pub apply_active: bool,
}

type Reply<T> = oneshot::Sender<Result<T, ControlError>>;

#[derive(Debug)]
pub(crate) enum Command {
    SetEnabled {
        tcp_port: u16,
        enabled: bool,
        reply: Reply<PortStatus>,
    },
    SetMode {
        tcp_port: u16,
        mode: PortMode,
        reply: Reply<PortStatus>,
    },
    UpdateSerial {
        tcp_port: u16,
        update: SerialUpdate,
        reply: Reply<PortStatus>,
    },
    Disconnect {
        tcp_port: u16,
        reply: Reply<usize>,
    },
    AddPort {
        config: Box<PortConfig>,
        reply: Reply<PortStatus>,
    },
}

/// Cloneable handle to a running [`RedirectorEngine`](crate::engine::RedirectorEngine).
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<EngineSnapshot>,
    started: Instant,
}

impl ControlHandle {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        status: watch::Receiver<EngineSnapshot>,
    ) -> Self {
        Self {
            commands,
            status,
            started: Instant::now(),
        }
    }

    /// Status of every port, in the order they were added.
    pub fn ports(&self) -> Vec<PortStatus> {
        self.status.borrow().ports.clone()
    }

    pub fn port(&self, tcp_port: u16) -> Option<PortStatus> {
        self.status
            .borrow()
            .ports
            .iter()
            .find(|p| p.config.tcp_port == tcp_port)
            .cloned()
    }

    pub fn system(&self) -> SystemStatus {
        let uptime_ms = self.started.elapsed().as_millis() as u64;
        SystemStatus::from_snapshot(&self.status.borrow(), uptime_ms)
    }

    /// A receiver that wakes whenever the engine publishes a new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<EngineSnapshot> {
        self.status.clone()
    }

    pub async fn set_enabled(&self, tcp_port: u16, enabled: bool) -> Result<PortStatus, ControlError> {
        self.request(|reply| Command::SetEnabled {
            tcp_port,
            enabled,
            reply,
        })
        .await
    }

    /// Switch the relay mode; live sessions are closed first.
    pub async fn set_mode(&self, tcp_port: u16, mode: PortMode) -> Result<PortStatus, ControlError> {
        self.request(|reply| Command::SetMode {
            tcp_port,
            mode,
            reply,
        })
        .await
    }

    pub async fn update_serial(
        &self,
        tcp_port: u16,
        update: SerialUpdate,
    ) -> Result<PortStatus, ControlError> {
        self.request(|reply| Command::UpdateSerial {
            tcp_port,
            update,
            reply,
        })
        .await
    }

    /// Close every session on a port; returns how many were closed.
    pub async fn disconnect(&self, tcp_port: u16) -> Result<usize, ControlError> {
        self.request(|reply| Command::Disconnect { tcp_port, reply })
            .await
    }

    pub async fn add_port(&self, config: PortConfig) -> Result<PortStatus, ControlError> {
        self.request(|reply| Command::AddPort {
            config: Box::new(config),
            reply,
        })
        .await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ControlError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .map_err(|_| ControlError::EngineStopped)?;
        rx.await.map_err(|_| ControlError::EngineStopped)?
    }
}
