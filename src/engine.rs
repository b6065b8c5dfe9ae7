//! The redirector loop.
//!
//! One task owns every [`PortController`]. Each iteration it applies queued
//! management commands, polls every controller once (starting one further
//! along each time so no port is always served first), and publishes a
//! status snapshot. When an iteration moves nothing the loop parks until a
//! listener or client socket is ready, a command arrives, or the tick
//! passes. UARTs have no readiness to wait on, so the tick is
//! `engine.tick_ms` while any session is live and [`IDLE_TICK`] otherwise.

use crate::config::{EngineConfig, PortConfig};
use crate::control::{Command, ControlError, ControlHandle};
use crate::controller::PortController;
use crate::port::UartFactory;
use crate::state::{EngineSnapshot, PortStatus};
use std::task::Poll;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Snapshot refresh interval while data is flowing.
const STATUS_INTERVAL: Duration = Duration::from_millis(50);

/// Longest park with no live session.
pub const IDLE_TICK: Duration = Duration::from_secs(1);

enum Wakeup {
    Ready,
    Command(Command),
    Stop,
}

pub struct RedirectorEngine {
    config: EngineConfig,
    factory: Box<dyn UartFactory>,
    controllers: Vec<PortController>,
    commands: mpsc::UnboundedReceiver<Command>,
    status: watch::Sender<EngineSnapshot>,
    cursor: usize,
    last_publish: Option<Instant>,
}

impl std::fmt::Debug for RedirectorEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedirectorEngine")
            .field("config", &self.config)
            .field("ports", &self.controllers.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl RedirectorEngine {
    pub fn new(config: EngineConfig, factory: impl UartFactory + 'static) -> (Self, ControlHandle) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(EngineSnapshot::default());
        let engine = Self {
            config,
            factory: Box::new(factory),
            controllers: Vec::new(),
            commands: command_rx,
            status: status_tx,
            cursor: 0,
            last_publish: None,
        };
        (engine, ControlHandle::new(command_tx, status_rx))
    }

    /// Open the port's UART and start serving it.
    pub fn add_port(&mut self, mut config: PortConfig) -> Result<PortStatus, ControlError> {
        config
            .validate()
            .map_err(|e| ControlError::InvalidRequest(e.to_string()))?;
        if self.controllers.iter().any(|c| c.tcp_port() == config.tcp_port) {
            return Err(ControlError::PortExists(config.tcp_port));
        }
        if config.port_id.is_none() {
            let next = self
                .controllers
                .iter()
                .filter_map(|c| c.config().port_id)
                .max()
                .map_or(self.controllers.len() as u32, |id| id + 1);
            config.port_id = Some(next);
        }

        let uart = self.factory.open(&config.uart, config.line_params())?;
        let controller = PortController::new(config, uart, &self.config)?;
        self.add_controller(controller)
    }

    /// Serve an already constructed controller.
    pub fn add_controller(&mut self, controller: PortController) -> Result<PortStatus, ControlError> {
        if self
            .controllers
            .iter()
            .any(|c| c.tcp_port() == controller.tcp_port())
        {
            return Err(ControlError::PortExists(controller.tcp_port()));
        }
        let now = Instant::now();
        let status = controller.status(now);
        self.controllers.push(controller);
        self.publish(now);
        Ok(status)
    }

    pub fn port_count(&self) -> usize {
        self.controllers.len()
    }

    /// One pass over commands and ports; returns the work done.
    pub fn poll_once(&mut self, now: Instant) -> usize {
        let mut work = 0;
        while let Ok(command) = self.commands.try_recv() {
            self.handle_command(command, now);
            work += 1;
        }

        let count = self.controllers.len();
        if count > 0 {
            let start = self.cursor % count;
            for offset in 0..count {
                work += self.controllers[(start + offset) % count].poll(now);
            }
            self.cursor = (start + 1) % count;
        }

        if work > 0 || self.publish_due(now) {
            self.publish(now);
        }
        work
    }

    /// Run until `shutdown` becomes true (or its sender is dropped), then
    /// close every session.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(ports = self.controllers.len(), tick_ms = self.config.tick_ms, "redirector engine started");
        let tick = self.config.tick();
        loop {
            if *shutdown.borrow() {
                break;
            }
            if self.poll_once(Instant::now()) > 0 {
                tokio::task::yield_now().await;
                continue;
            }

            let wait = if self.controllers.iter().any(PortController::needs_tick) {
                tick
            } else {
                IDLE_TICK.max(tick)
            };
            let controllers = &mut self.controllers;
            let sockets_ready = std::future::poll_fn(|cx| {
                let mut ready = false;
                for controller in controllers.iter_mut() {
                    ready |= controller.poll_ready(cx);
                }
                if ready {
                    Poll::Ready(())
                } else {
                    Poll::Pending
                }
            });
            let wakeup = tokio::select! {
                () = sockets_ready => Wakeup::Ready,
                () = tokio::time::sleep(wait) => Wakeup::Ready,
                Some(command) = self.commands.recv() => Wakeup::Command(command),
                changed = shutdown.changed() => match changed {
                    Ok(()) => Wakeup::Ready,
                    Err(_) => Wakeup::Stop,
                },
            };
            match wakeup {
                Wakeup::Ready => {}
                Wakeup::Command(command) => {
                    let now = Instant::now();
                    self.handle_command(command, now);
                    self.publish(now);
                }
                Wakeup::Stop => break,
            }
        }
        self.shutdown_all(Instant::now());
        info!("redirector engine stopped");
    }

    /// Close every session and listener.
    pub fn shutdown_all(&mut self, now: Instant) {
        for controller in &mut self.controllers {
            controller.shutdown(now);
        }
        self.publish(now);
    }

    fn handle_command(&mut self, command: Command, now: Instant) {
        match command {
            Command::SetEnabled {
                tcp_port,
                enabled,
                reply,
            } => {
                let result = self.with_port(tcp_port, now, |c| {
                    if enabled {
                        c.enable()
                    } else {
                        c.disable(now);
                        Ok(())
                    }
                });
                let _ = reply.send(result);
            }
            Command::SetMode {
                tcp_port,
                mode,
                reply,
            } => {
                let result = self.with_port(tcp_port, now, |c| {
                    c.set_mode(mode, now);
                    Ok(())
                });
                let _ = reply.send(result);
            }
            Command::UpdateSerial {
                tcp_port,
                update,
                reply,
            } => {
                let result = self.with_port(tcp_port, now, |c| c.update_serial(&update));
                let _ = reply.send(result);
            }
            Command::Disconnect { tcp_port, reply } => {
                let result = self
                    .controller_mut(tcp_port)
                    .map(|c| c.disconnect(now));
                let _ = reply.send(result);
            }
            Command::AddPort { config, reply } => {
                let tcp_port = config.tcp_port;
                let result = self.add_port(*config);
                if let Err(err) = &result {
                    warn!(port = tcp_port, error = %err, "failed to add port");
                }
                let _ = reply.send(result);
            }
        }
    }

    fn controller_mut(&mut self, tcp_port: u16) -> Result<&mut PortController, ControlError> {
        self.controllers
            .iter_mut()
            .find(|c| c.tcp_port() == tcp_port)
            .ok_or(ControlError::UnknownPort(tcp_port))
    }

    fn with_port(
        &mut self,
        tcp_port: u16,
        now: Instant,
        apply: impl FnOnce(&mut PortController) -> Result<(), ControlError>,
    ) -> Result<PortStatus, ControlError> {
        let controller = self.controller_mut(tcp_port)?;
        if let Err(err) = apply(controller) {
            error!(port = tcp_port, error = %err, "management command failed");
            return Err(err);
        }
        Ok(controller.status(now))
    }

    fn publish_due(&self, now: Instant) -> bool {
        self.last_publish
            .map_or(true, |at| now.saturating_duration_since(at) >= STATUS_INTERVAL)
    }

    fn publish(&mut self, now: Instant) {
        let snapshot = EngineSnapshot {
            ports: self.controllers.iter().map(|c| c.status(now)).collect(),
            buffer_budget: self.controllers.iter().map(PortController::buffer_budget).sum(),
        };
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        self.last_publish = Some(now);
    }
}
