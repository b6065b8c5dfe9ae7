//! Status snapshots published by the engine.
//!
//! These are plain serializable values; the engine rebuilds them from its
//! controllers and hands them out through a `watch` channel, so readers never
//! touch live port state.

use crate::config::PortConfig;
use crate::port::LiveLineParams;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// No listener; connections are refused.
    Disabled,
    /// Listening with no live session.
    Listening,
    /// At least one session is live.
    Active,
}

impl fmt::Display for PortState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Listening => "listening",
            Self::Active => "active",
        })
    }
}

/// Running totals for one port since it was added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortCounters {
    pub sessions_accepted: u64,
    /// Connections closed at once because the port was busy.
    pub sessions_rejected: u64,
    pub bytes_to_uart: u64,
    pub bytes_from_uart: u64,
    pub uart_errors: u64,
    pub protocol_errors: u64,
}

/// Configuration and runtime state of one port.
///
/// The serial fields flattened from `config` (`baud`, `parity`, ...) are the
/// port's configured defaults, restored whenever a new primary session is
/// admitted. What the UART is running right now, including changes a telnet
/// client negotiated, is under `live`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortStatus {
    #[serde(flatten)]
    pub config: PortConfig,
    pub state: PortState,
    /// Parameters in effect on the UART right now.
    pub live: LiveLineParams,
    /// Every live session, monitors included.
    pub active_sessions: usize,
    /// How many of `active_sessions` are monitors.
    pub monitor_sessions: usize,
    /// Milliseconds since the most recent byte on any live session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_ms: Option<u64>,
    pub buffered_bytes: usize,
    pub counters: PortCounters,
}

/// Everything the engine publishes per iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineSnapshot {
    pub ports: Vec<PortStatus>,
    /// Upper bound on queued bytes across every possible session.
    pub buffer_budget: usize,
}

/// Whole-process summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub configured_ports: usize,
    pub enabled_ports: usize,
    pub active_sessions: usize,
    pub uptime_ms: u64,
    pub buffered_bytes: usize,
    pub buffer_budget: usize,
}

impl SystemStatus {
    pub fn from_snapshot(snapshot: &EngineSnapshot, uptime_ms: u64) -> Self {
        Self {
            configured_ports: snapshot.ports.len(),
            enabled_ports: snapshot.ports.iter().filter(|p| p.config.enabled).count(),
            active_sessions: snapshot
                .ports
                .iter()
                .map(|p| p.active_sessions)
                .sum(),
            uptime_ms,
            buffered_bytes: snapshot.ports.iter().map(|p| p.buffered_bytes).sum(),
            buffer_budget: snapshot.buffer_budget,
        }
    }
}
