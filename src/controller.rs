//! Per-port controller: one UART, one listener, its sessions.
//!
//! The controller is the only owner of the UART and of the live line
//! parameters. Sessions hand it negotiation events; it applies them and
//! queues the acknowledgement back on the requesting session.
//!
//! ```text
//!   Disabled ──enable──▶ Listening ──accept──▶ Active
//!      ▲                    ▲                    │
//!      └─────disable────────┴──last session gone─┘
//! ```

use crate::config::{EngineConfig, PortConfig, PortMode};
use crate::control::{ControlError, SerialUpdate};
use crate::port::{ControlLine, FlowControl, LiveLineParams, PurgeDirection, UartChannel, UartError};
use crate::queue::UartStep;
use crate::session::{CloseReason, PortSession, ReadOutcome, SessionError, SessionRole};
use crate::state::{PortCounters, PortState, PortStatus};
use crate::telnet::rfc2217::{flow_code, line_code};
use crate::telnet::{ComPortReply, ControlRequest, NegotiationEvent};
use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// How often modem input lines are sampled for telnet clients.
const MODEM_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Waker for accepts made outside the engine's wait; the engine
/// re-registers its own before it parks.
struct NoopWake;

impl Wake for NoopWake {
    fn wake(self: Arc<Self>) {}
}

/// Output line state as last driven.
#[derive(Debug, Clone, Copy)]
struct LineControl {
    dtr: bool,
    rts: bool,
    brk: bool,
}

impl Default for LineControl {
    fn default() -> Self {
        Self {
            dtr: true,
            rts: true,
            brk: false,
        }
    }
}

/// Owns one redirected port.
#[derive(Debug)]
pub struct PortController {
    config: PortConfig,
    bind_addr: SocketAddr,
    listener: Option<TcpListener>,
    /// Connections picked up while the engine was waiting for readiness.
    backlog: Vec<(TcpStream, SocketAddr)>,
    accept_waker: Waker,
    uart: Box<dyn UartChannel>,
    /// Admission order; the primary session is the oldest one.
    sessions: Vec<PortSession>,
    lines: LineControl,
    capacity: usize,
    watchdog: Option<Duration>,
    counters: PortCounters,
    next_session_id: u64,
    last_modem_poll: Option<Instant>,
    scratch: Vec<u8>,
}

impl PortController {
    /// Create the controller and, if the port is enabled, start listening on
    /// `engine.listen_host:tcp_port`. Listening needs a tokio runtime.
    pub fn new(
        config: PortConfig,
        uart: Box<dyn UartChannel>,
        engine: &EngineConfig,
    ) -> Result<Self, ControlError> {
        let tcp_port = config.tcp_port;
        let bind_addr = (engine.listen_host.as_str(), tcp_port)
            .to_socket_addrs()
            .map_err(|source| ControlError::Bind { tcp_port, source })?
            .next()
            .ok_or_else(|| ControlError::Bind {
                tcp_port,
                source: ErrorKind::AddrNotAvailable.into(),
            })?;

        let mut controller = Self::assemble(config, bind_addr, uart, engine);
        if controller.config.enabled {
            controller.listen()?;
        }
        Ok(controller)
    }

    /// Create an enabled controller around an already bound listener. Must
    /// be called from within a tokio runtime.
    pub fn with_listener(
        mut config: PortConfig,
        listener: std::net::TcpListener,
        uart: Box<dyn UartChannel>,
        engine: &EngineConfig,
    ) -> std::io::Result<Self> {
        let bind_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;
        let listener = TcpListener::from_std(listener)?;
        config.tcp_port = bind_addr.port();
        config.enabled = true;
        let mut controller = Self::assemble(config, bind_addr, uart, engine);
        controller.listener = Some(listener);
        Ok(controller)
    }

    fn assemble(
        config: PortConfig,
        bind_addr: SocketAddr,
        uart: Box<dyn UartChannel>,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            config,
            bind_addr,
            listener: None,
            backlog: Vec::new(),
            accept_waker: Waker::from(Arc::new(NoopWake)),
            uart,
            sessions: Vec::new(),
            lines: LineControl::default(),
            capacity: engine.buffer_size,
            watchdog: engine.watchdog(),
            counters: PortCounters::default(),
            next_session_id: 0,
            last_modem_poll: None,
            scratch: vec![0; engine.buffer_size],
        }
    }

    fn listen(&mut self) -> Result<(), ControlError> {
        let tcp_port = self.config.tcp_port;
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(ControlError::Bind {
                tcp_port,
                source: std::io::Error::other("no tokio runtime to register with"),
            });
        }
        let listener = std::net::TcpListener::bind(self.bind_addr)
            .and_then(|l| l.set_nonblocking(true).map(|()| l))
            .and_then(TcpListener::from_std)
            .map_err(|source| ControlError::Bind { tcp_port, source })?;
        info!(
            port = tcp_port,
            addr = %self.bind_addr,
            mode = %self.config.mode,
            uart = %self.uart.name(),
            "listening"
        );
        self.listener = Some(listener);
        Ok(())
    }

    pub fn tcp_port(&self) -> u16 {
        self.config.tcp_port
    }

    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    pub fn state(&self) -> PortState {
        if self.listener.is_none() {
            PortState::Disabled
        } else if self.sessions.is_empty() {
            PortState::Listening
        } else {
            PortState::Active
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn buffered(&self) -> usize {
        self.sessions.iter().map(PortSession::buffered).sum()
    }

    /// Most bytes this port's sessions could ever hold.
    pub fn buffer_budget(&self) -> usize {
        (1 + self.config.max_monitors) * 2 * self.capacity
    }

    /// Run one pass over the port; returns a measure of work done (bytes
    /// moved plus connections and events handled).
    pub fn poll(&mut self, now: Instant) -> usize {
        self.reap(now);
        if self.sessions.is_empty() {
            self.discard_uart();
        }
        let mut work = self.accept(now);
        work += self.read_sockets(now);
        work += self.write_uart();
        work += self.read_uart();
        work += self.flush_sockets(now);
        self.poll_line_status(now);
        self.finish_half_closed();
        self.close_marked(now);
        work
    }

    /// Register for the socket events [`poll`](Self::poll) would act on;
    /// true if one is already pending.
    pub fn poll_ready(&mut self, cx: &mut Context<'_>) -> bool {
        let mut ready = !self.backlog.is_empty();
        if let Some(listener) = &self.listener {
            match listener.poll_accept(cx) {
                Poll::Ready(Ok(connection)) => {
                    self.backlog.push(connection);
                    ready = true;
                }
                Poll::Ready(Err(e)) => {
                    warn!(port = self.config.tcp_port, error = %e, "accept failed");
                }
                Poll::Pending => {}
            }
        }
        for session in &self.sessions {
            ready |= session.poll_ready(cx);
        }
        ready
    }

    /// Whether the port needs timed polling. UARTs have no readiness to wait
    /// on, so any live session does.
    pub fn needs_tick(&self) -> bool {
        !self.sessions.is_empty() || !self.backlog.is_empty()
    }

    fn reap(&mut self, now: Instant) {
        let idle_timeout = self.config.idle_timeout();
        for session in &mut self.sessions {
            if session.is_idle(now, idle_timeout) {
                session.mark_closed(CloseReason::IdleTimeout);
            } else if session.check_stall(now, self.watchdog) {
                session.mark_closed(CloseReason::Stalled);
            }
        }
        self.close_marked(now);
    }

    fn accept(&mut self, now: Instant) -> usize {
        let mut accepted = 0;
        for (stream, peer) in std::mem::take(&mut self.backlog) {
            accepted += 1;
            self.admit(stream, peer, now);
        }
        let waker = self.accept_waker.clone();
        let mut cx = Context::from_waker(&waker);
        loop {
            let result = match &self.listener {
                Some(listener) => listener.poll_accept(&mut cx),
                None => break,
            };
            match result {
                Poll::Ready(Ok((stream, peer))) => {
                    accepted += 1;
                    self.admit(stream, peer, now);
                }
                Poll::Ready(Err(e)) => {
                    warn!(port = self.config.tcp_port, error = %e, "accept failed");
                    break;
                }
                Poll::Pending => break,
            }
        }
        accepted
    }

    fn admit(&mut self, stream: TcpStream, peer: SocketAddr, now: Instant) {
        let port = self.config.tcp_port;
        let monitors = self.sessions.len().saturating_sub(1);
        let role = if self.sessions.is_empty() {
            SessionRole::Primary
        } else if self.config.mode == PortMode::Telnet && monitors < self.config.max_monitors {
            SessionRole::Monitor
        } else {
            self.counters.sessions_rejected += 1;
            info!(port, %peer, "connection rejected: port busy");
            if let Ok(stream) = stream.into_std() {
                let _ = stream.shutdown(Shutdown::Both);
            }
            return;
        };

        self.next_session_id += 1;
        let id = self.next_session_id;
        match PortSession::new(id, stream, peer, self.config.mode, role, self.capacity, now) {
            Ok(session) => {
                if role == SessionRole::Primary {
                    self.restore_line_params();
                }
                self.counters.sessions_accepted += 1;
                info!(port, session = id, %peer, ?role, "session opened");
                self.sessions.push(session);
            }
            Err(err) => warn!(port, %peer, error = %err, "failed to set up session"),
        }
    }

    /// Put the configured parameters back on the UART for a new primary.
    fn restore_line_params(&mut self) {
        let params = self.config.line_params();
        if let Err(err) = self.uart.configure(params) {
            self.counters.uart_errors += 1;
            warn!(port = self.config.tcp_port, %params, error = %err, "failed to restore line parameters");
        }
    }

    fn read_sockets(&mut self, now: Instant) -> usize {
        let mut work = 0;
        for session in &mut self.sessions {
            if session.is_closing() || session.is_half_closed() {
                continue;
            }
            match session.read_socket(&mut self.scratch, now) {
                Ok(ReadOutcome::Read(n)) => work += n,
                Ok(ReadOutcome::Closed) => session.half_close(),
                Ok(ReadOutcome::WouldBlock | ReadOutcome::Full) => {}
                Err(SessionError::Codec(err)) => {
                    self.counters.protocol_errors += 1;
                    warn!(port = self.config.tcp_port, session = session.id(), error = %err, "closing session");
                    session.mark_closed(CloseReason::ProtocolError);
                }
                Err(SessionError::Socket(err)) => {
                    debug!(port = self.config.tcp_port, session = session.id(), error = %err, "socket read failed");
                    session.mark_closed(CloseReason::SocketError);
                }
            }
        }
        work
    }

    fn write_uart(&mut self) -> usize {
        let mut work = 0;
        for index in 0..self.sessions.len() {
            if self.sessions[index].is_closing() {
                continue;
            }
            loop {
                let (written, step) = self.sessions[index].drain_to_uart(self.uart.as_mut());
                work += written;
                self.counters.bytes_to_uart += written as u64;
                match step {
                    UartStep::Idle | UartStep::Blocked => break,
                    UartStep::Event(event) => {
                        work += 1;
                        self.handle_event(index, event);
                    }
                }
            }
        }
        work
    }

    /// Apply one negotiation event from `sessions[index]` and queue its ack.
    fn handle_event(&mut self, index: usize, event: NegotiationEvent) {
        let port = self.config.tcp_port;
        let applies = self.sessions[index].role() == SessionRole::Primary;
        debug!(port, session = self.sessions[index].id(), ?event, applies, "negotiation");

        let reply = match event {
            NegotiationEvent::Signature(text) => {
                if text.is_empty() {
                    Some(ComPortReply::Signature(self.signature()))
                } else {
                    info!(port, signature = %String::from_utf8_lossy(&text), "client signature");
                    None
                }
            }
            NegotiationEvent::SetBaud(baud) => {
                if let Some(baud) = baud.filter(|_| applies) {
                    self.apply_live(|p| p.baud = baud);
                }
                Some(ComPortReply::Baud(self.uart.params().baud))
            }
            NegotiationEvent::SetDataBits(bits) => {
                if let Some(bits) = bits.filter(|_| applies) {
                    self.apply_live(|p| p.data_bits = bits);
                }
                Some(ComPortReply::DataBits(self.uart.params().data_bits))
            }
            NegotiationEvent::SetParity(parity) => {
                if let Some(parity) = parity.filter(|_| applies) {
                    self.apply_live(|p| p.parity = parity);
                }
                Some(ComPortReply::Parity(self.uart.params().parity))
            }
            NegotiationEvent::SetStopBits(bits) => {
                if let Some(bits) = bits.filter(|_| applies) {
                    self.apply_live(|p| p.stop_bits = bits);
                }
                Some(ComPortReply::StopBits(self.uart.params().stop_bits))
            }
            NegotiationEvent::SetControl(request) => {
                Some(ComPortReply::Control(self.handle_control(request, applies)))
            }
            NegotiationEvent::QueryLineState => {
                Some(ComPortReply::LineState(self.sessions[index].take_line_state()))
            }
            NegotiationEvent::QueryModemState => {
                let bits = self
                    .uart
                    .modem_state()
                    .map_or_else(|| self.sessions[index].last_modem_state(), |m| m.to_bits());
                Some(ComPortReply::ModemState(bits))
            }
            NegotiationEvent::SuspendOutput => {
                self.sessions[index].set_output_suspended(true);
                None
            }
            NegotiationEvent::ResumeOutput => {
                self.sessions[index].set_output_suspended(false);
                None
            }
            NegotiationEvent::SetLineStateMask(mask) => Some(ComPortReply::LineStateMask(
                self.sessions[index].set_linestate_mask(mask),
            )),
            NegotiationEvent::SetModemStateMask(mask) => Some(ComPortReply::ModemStateMask(
                self.sessions[index].set_modemstate_mask(mask),
            )),
            NegotiationEvent::Purge(direction) => {
                if applies {
                    self.purge(index, direction);
                }
                Some(ComPortReply::Purge(direction))
            }
            NegotiationEvent::SendBreak => {
                if applies {
                    self.drive(ControlLine::Break, true);
                    self.drive(ControlLine::Break, false);
                }
                None
            }
        };

        if let Some(reply) = reply {
            self.sessions[index].push_reply(&reply);
        }
    }

    fn signature(&self) -> String {
        format!(
            "{} {} port {} on {}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            self.config.tcp_port,
            self.uart.name()
        )
    }

    /// Change the live parameters; on failure the UART keeps its old ones.
    fn apply_live(&mut self, change: impl FnOnce(&mut LiveLineParams)) {
        let mut params = self.uart.params();
        change(&mut params);
        match self.uart.configure(params) {
            Ok(()) => info!(port = self.config.tcp_port, params = %self.uart.params(), "line parameters changed"),
            Err(err) => {
                self.counters.uart_errors += 1;
                warn!(port = self.config.tcp_port, requested = %params, error = %err, "line parameters rejected");
            }
        }
    }

    /// Handle SET-CONTROL; returns the value to acknowledge with.
    fn handle_control(&mut self, request: ControlRequest, applies: bool) -> u8 {
        match request {
            ControlRequest::Flow(flow) | ControlRequest::InboundFlow(flow) if applies => {
                self.apply_live(|p| p.flow_control = flow);
            }
            ControlRequest::Break(on) if applies => self.drive(ControlLine::Break, on),
            ControlRequest::Dtr(on) if applies => self.drive(ControlLine::Dtr, on),
            ControlRequest::Rts(on) if applies => self.drive(ControlLine::Rts, on),
            ControlRequest::Unsupported(code) => {
                debug!(port = self.config.tcp_port, code, "unsupported SET-CONTROL value");
            }
            _ => {}
        }

        let flow = self.uart.params().flow_control;
        match request {
            ControlRequest::QueryFlow | ControlRequest::Flow(_) | ControlRequest::Unsupported(_) => {
                flow_code(flow, false)
            }
            ControlRequest::QueryInboundFlow | ControlRequest::InboundFlow(_) => {
                flow_code(flow, true)
            }
            ControlRequest::QueryBreak | ControlRequest::Break(_) => {
                line_code(request, self.lines.brk)
            }
            ControlRequest::QueryDtr | ControlRequest::Dtr(_) => line_code(request, self.lines.dtr),
            ControlRequest::QueryRts | ControlRequest::Rts(_) => line_code(request, self.lines.rts),
        }
    }

    fn drive(&mut self, line: ControlLine, asserted: bool) {
        match self.uart.set_control(line, asserted) {
            Ok(()) => match line {
                ControlLine::Dtr => self.lines.dtr = asserted,
                ControlLine::Rts => self.lines.rts = asserted,
                ControlLine::Break => self.lines.brk = asserted,
            },
            Err(err) => debug!(port = self.config.tcp_port, ?line, error = %err, "control line not driven"),
        }
    }

    fn purge(&mut self, index: usize, direction: PurgeDirection) {
        let dropped = self.sessions[index].purge(direction);
        if let Err(err) = self.uart.purge(direction) {
            warn!(port = self.config.tcp_port, error = %err, "UART purge failed");
        }
        debug!(port = self.config.tcp_port, ?direction, dropped, "purged");
    }

    /// Drop UART output that arrived while nobody was connected.
    fn discard_uart(&mut self) {
        loop {
            let n = self.uart.try_read(&mut self.scratch);
            self.counters.bytes_from_uart += n as u64;
            if n < self.scratch.len() {
                break;
            }
        }
    }

    /// Read the UART into every live session, no more than the fullest one
    /// can take. With no session the bytes are dropped.
    fn read_uart(&mut self) -> usize {
        let limit = self
            .sessions
            .iter()
            .filter(|s| !s.is_closing())
            .map(PortSession::uart_room)
            .min()
            .unwrap_or(usize::MAX)
            .min(self.scratch.len());
        if limit == 0 {
            return 0;
        }
        let n = self.uart.try_read(&mut self.scratch[..limit]);
        if n == 0 {
            return 0;
        }
        self.counters.bytes_from_uart += n as u64;
        let bytes = &self.scratch[..n];
        for session in self.sessions.iter_mut().filter(|s| !s.is_closing()) {
            session.deliver_uart(bytes);
        }
        n
    }

    fn flush_sockets(&mut self, now: Instant) -> usize {
        let mut work = 0;
        for session in &mut self.sessions {
            if session.is_closing() {
                continue;
            }
            match session.flush_socket(now) {
                Ok(n) => work += n,
                Err(err) => {
                    debug!(port = self.config.tcp_port, session = session.id(), error = %err, "socket write failed");
                    session.mark_closed(CloseReason::SocketError);
                }
            }
        }
        work
    }

    fn poll_line_status(&mut self, now: Instant) {
        while let Some(err) = self.uart.pending_errors() {
            self.counters.uart_errors += 1;
            match err {
                UartError::Io(_) | UartError::NotFound(_) => {
                    warn!(port = self.config.tcp_port, error = %err, "UART error")
                }
                _ => debug!(port = self.config.tcp_port, error = %err, "line error"),
            }
            let bit = err.line_state_bit();
            if bit != 0 {
                for session in &mut self.sessions {
                    session.notify_line_state(bit);
                }
            }
        }

        if self.config.mode != PortMode::Telnet || self.sessions.is_empty() {
            return;
        }
        if self
            .last_modem_poll
            .is_some_and(|at| now.saturating_duration_since(at) < MODEM_POLL_INTERVAL)
        {
            return;
        }
        self.last_modem_poll = Some(now);
        if let Some(modem) = self.uart.modem_state() {
            let bits = modem.to_bits();
            for session in &mut self.sessions {
                session.notify_modem_state(bits);
            }
        }
    }

    /// Close half-closed sessions once nothing is left to deliver.
    fn finish_half_closed(&mut self) {
        for session in &mut self.sessions {
            if session.is_half_closed() && session.is_drained() {
                session.mark_closed(CloseReason::ClientClosed);
            }
        }
    }

    /// Close sessions marked for closing and promote a monitor if the
    /// primary went away.
    fn close_marked(&mut self, now: Instant) {
        let mut index = 0;
        while index < self.sessions.len() {
            let Some(reason) = self.sessions[index].close_reason() else {
                index += 1;
                continue;
            };
            let session = self.sessions.remove(index);
            if session.role() == SessionRole::Primary {
                session.close(reason, Some(self.uart.as_mut()), now);
            } else {
                session.close(reason, None, now);
            }
        }

        if let Some(first) = self.sessions.first_mut() {
            if first.role() == SessionRole::Monitor {
                first.promote();
                info!(port = self.config.tcp_port, session = first.id(), "monitor promoted to primary");
                self.restore_line_params();
            }
        }
    }

    fn close_all(&mut self, reason: CloseReason, now: Instant) -> usize {
        let count = self.sessions.len();
        for session in &mut self.sessions {
            session.mark_closed(reason);
        }
        self.close_marked(now);
        count
    }

    /// Start listening again. No-op when already enabled.
    pub fn enable(&mut self) -> Result<(), ControlError> {
        if self.listener.is_none() {
            self.listen()?;
        }
        self.config.enabled = true;
        Ok(())
    }

    /// Close live sessions, then stop listening.
    pub fn disable(&mut self, now: Instant) {
        self.close_all(CloseReason::Disabled, now);
        self.backlog.clear();
        if self.listener.take().is_some() {
            info!(port = self.config.tcp_port, "disabled");
        }
        self.config.enabled = false;
    }

    /// Switch relay mode. Live sessions are closed since their pump was
    /// chosen for the old mode.
    pub fn set_mode(&mut self, mode: PortMode, now: Instant) {
        if mode == self.config.mode {
            return;
        }
        self.close_all(CloseReason::ModeChanged, now);
        if mode != PortMode::Telnet && self.config.max_monitors > 0 {
            info!(port = self.config.tcp_port, %mode, "monitor sessions dropped with telnet mode");
            self.config.max_monitors = 0;
        }
        info!(port = self.config.tcp_port, from = %self.config.mode, to = %mode, "mode changed");
        self.config.mode = mode;
    }

    /// Change the configured serial settings. See [`SerialUpdate`].
    pub fn update_serial(&mut self, update: &SerialUpdate) -> Result<(), ControlError> {
        let mut params = self.config.line_params();
        if let Some(baud) = update.baud {
            if baud == 0 {
                return Err(ControlError::InvalidRequest("baud must be positive".into()));
            }
            params.baud = baud;
        }
        if let Some(bits) = update.data_bits {
            params.data_bits = bits;
        }
        if let Some(parity) = update.parity {
            params.parity = parity;
        }
        if let Some(bits) = update.stop_bits {
            params.stop_bits = bits;
        }
        if let Some(flow) = update.flow_control {
            if flow == FlowControl::RtsCts
                && (self.config.rts_pin == Some(-1) || self.config.cts_pin == Some(-1))
            {
                return Err(ControlError::InvalidRequest(
                    "rtscts needs rts_pin and cts_pin routed".into(),
                ));
            }
            params.flow_control = flow;
        }

        if update.apply_active || self.sessions.is_empty() {
            self.uart.configure(params)?;
        }
        self.config.set_line_params(params);
        if let Some(ms) = update.idle_timeout_ms {
            self.config.idle_timeout_ms = ms;
        }
        info!(port = self.config.tcp_port, %params, applied = update.apply_active || self.sessions.is_empty(), "serial settings updated");
        Ok(())
    }

    /// Close every session; returns how many were closed.
    pub fn disconnect(&mut self, now: Instant) -> usize {
        self.close_all(CloseReason::Disconnected, now)
    }

    pub fn shutdown(&mut self, now: Instant) {
        self.close_all(CloseReason::Shutdown, now);
        self.backlog.clear();
        self.listener = None;
    }

    pub fn status(&self, now: Instant) -> PortStatus {
        let monitors = self
            .sessions
            .iter()
            .filter(|s| s.role() == SessionRole::Monitor)
            .count();
        let idle_ms = self
            .sessions
            .iter()
            .map(PortSession::last_activity)
            .max()
            .map(|at| now.saturating_duration_since(at).as_millis() as u64);
        PortStatus {
            config: self.config.clone(),
            state: self.state(),
            live: self.uart.params(),
            active_sessions: self.sessions.len(),
            monitor_sessions: monitors,
            idle_ms,
            buffered_bytes: self.buffered(),
            counters: self.counters,
        }
    }
}
