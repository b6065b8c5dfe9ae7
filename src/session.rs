//! Client sessions.
//!
//! A `PortSession` owns one accepted TCP connection and the two byte queues
//! between it and the UART. The relay behaviour is picked once, when the
//! session is created, from the port mode:
//!
//! - raw: bytes pass through untouched in both directions
//! - telnet: client bytes go through the RFC2217 codec, UART bytes are
//!   IAC-escaped
//! - rawlp: client bytes reach the UART, UART output never reaches the client
//!
//! Sessions never touch the UART parameters. Negotiation events are queued
//! in stream order and handed to the owning controller once all data ahead
//! of them has been written.

use crate::config::PortMode;
use crate::port::{PurgeDirection, UartChannel};
use crate::queue::{NetQueue, UartQueue, UartStep};
use crate::telnet::{ComPortReply, FrameCodec, Inbound, CodecError};
use serde::Serialize;
use std::fmt;
use std::io::{self, ErrorKind};
use std::net::{Shutdown, SocketAddr};
use std::task::Context;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, info, trace};

/// Errors that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),

    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
}

/// Whether a session drives the UART or only watches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// Writes to the UART and may change its parameters.
    Primary,
    /// Receives UART output only; its writes and parameter requests are ignored.
    Monitor,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    ClientClosed,
    IdleTimeout,
    ProtocolError,
    SocketError,
    /// Back-pressure made no progress for longer than the watchdog allows.
    Stalled,
    Disabled,
    Disconnected,
    ModeChanged,
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::ClientClosed => "client closed",
            Self::IdleTimeout => "idle timeout",
            Self::ProtocolError => "protocol error",
            Self::SocketError => "socket error",
            Self::Stalled => "stalled",
            Self::Disabled => "port disabled",
            Self::Disconnected => "disconnected by operator",
            Self::ModeChanged => "mode changed",
            Self::Shutdown => "shutdown",
        };
        f.write_str(text)
    }
}

/// Outcome of one socket read attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    Read(usize),
    WouldBlock,
    /// A queue is full; the socket was not read.
    Full,
    /// The client closed its side.
    Closed,
}

#[derive(Debug)]
struct TelnetState {
    codec: FrameCodec,
    inbound: Vec<Inbound>,
    encoded: Vec<u8>,
    output_suspended: bool,
    linestate_mask: u8,
    modemstate_mask: u8,
    line_bits: u8,
    last_modem: Option<u8>,
}

impl TelnetState {
    fn new() -> Self {
        Self {
            codec: FrameCodec::new(),
            inbound: Vec::new(),
            encoded: Vec::new(),
            output_suspended: false,
            linestate_mask: 0,
            modemstate_mask: 0xFF,
            line_bits: 0,
            last_modem: None,
        }
    }
}

#[derive(Debug)]
enum Pump {
    Raw,
    Telnet(Box<TelnetState>),
    LinePrinter,
}

/// One connected client.
#[derive(Debug)]
pub struct PortSession {
    id: u64,
    peer: SocketAddr,
    socket: TcpStream,
    role: SessionRole,
    pump: Pump,
    to_uart: UartQueue,
    to_net: NetQueue,
    opened_at: Instant,
    last_activity: Instant,
    stalled_since: Option<Instant>,
    /// The client shut down its sending side; no more reads.
    half_closed: bool,
    close_reason: Option<CloseReason>,
    bytes_from_client: u64,
    bytes_to_client: u64,
}

impl PortSession {
    /// Wrap an accepted connection.
    pub fn new(
        id: u64,
        socket: TcpStream,
        peer: SocketAddr,
        mode: PortMode,
        role: SessionRole,
        capacity: usize,
        now: Instant,
    ) -> io::Result<Self> {
        socket.set_nodelay(true)?;
        let pump = match mode {
            PortMode::Raw => Pump::Raw,
            PortMode::Telnet => Pump::Telnet(Box::new(TelnetState::new())),
            PortMode::Rawlp => Pump::LinePrinter,
        };
        Ok(Self {
            id,
            peer,
            socket,
            role,
            pump,
            to_uart: UartQueue::new(capacity),
            to_net: NetQueue::new(capacity),
            opened_at: now,
            last_activity: now,
            stalled_since: None,
            half_closed: false,
            close_reason: None,
            bytes_from_client: 0,
            bytes_to_client: 0,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn promote(&mut self) {
        self.role = SessionRole::Primary;
    }

    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Schedule the session for closing. The first reason sticks.
    pub fn mark_closed(&mut self, reason: CloseReason) {
        self.close_reason.get_or_insert(reason);
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn is_closing(&self) -> bool {
        self.close_reason.is_some()
    }

    /// Stop reading after the client's EOF; the session lingers until
    /// [`is_drained`](Self::is_drained).
    pub fn half_close(&mut self) {
        if !self.half_closed {
            debug!(session = self.id, "client finished sending");
        }
        self.half_closed = true;
    }

    pub fn is_half_closed(&self) -> bool {
        self.half_closed
    }

    /// True when nothing is left to hand to the UART or the client.
    pub fn is_drained(&self) -> bool {
        self.to_uart.is_empty() && self.to_net.is_empty()
    }

    /// Bytes held in both queues.
    pub fn buffered(&self) -> usize {
        self.to_uart.data_len() + self.to_net.data_len()
    }

    /// Read from the socket into the UART queue, decoding telnet if needed.
    pub fn read_socket(
        &mut self,
        scratch: &mut [u8],
        now: Instant,
    ) -> Result<ReadOutcome, SessionError> {
        let limit = self.read_limit(scratch.len());
        if limit == 0 {
            return Ok(ReadOutcome::Full);
        }

        let n = match self.socket.try_read(&mut scratch[..limit]) {
            Ok(0) => return Ok(ReadOutcome::Closed),
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(ReadOutcome::WouldBlock),
            Err(e) if e.kind() == ErrorKind::Interrupted => return Ok(ReadOutcome::WouldBlock),
            Err(e) => return Err(e.into()),
        };
        self.last_activity = now;
        self.bytes_from_client += n as u64;
        let input = &scratch[..n];
        trace!(session = self.id, bytes = n, "client -> port");

        match &mut self.pump {
            Pump::Raw | Pump::LinePrinter => {
                if self.role == SessionRole::Primary {
                    self.to_uart.push_data(input);
                }
            }
            Pump::Telnet(telnet) => {
                telnet.inbound.clear();
                let result = telnet.codec.decode(input, &mut telnet.inbound);
                for item in telnet.inbound.drain(..) {
                    match item {
                        Inbound::Data(bytes) if self.role == SessionRole::Primary => {
                            self.to_uart.push_data(&bytes)
                        }
                        Inbound::Data(_) => {}
                        Inbound::Event(event) => self.to_uart.push_event(event),
                    }
                }
                let replies = telnet.codec.take_replies();
                self.to_net.push_control(&replies);
                result?;
            }
        }
        Ok(ReadOutcome::Read(n))
    }

    /// Largest read the queues can absorb. Replies and events produced by
    /// a telnet read are bounded by its length.
    fn read_limit(&self, scratch: usize) -> usize {
        if self.to_net.control_full() || self.to_uart.events_full() {
            return 0;
        }
        match self.role {
            SessionRole::Primary => self.to_uart.room().min(scratch),
            SessionRole::Monitor => scratch,
        }
    }

    /// Register interest in the socket events this session can act on;
    /// true if one of them is already pending.
    pub fn poll_ready(&self, cx: &mut Context<'_>) -> bool {
        if self.is_closing() {
            return false;
        }
        let mut ready = false;
        if !self.half_closed && self.read_limit(usize::MAX) > 0 {
            ready |= self.socket.poll_read_ready(cx).is_ready();
        }
        if self.to_net.front(!self.output_suspended()).is_some() {
            ready |= self.socket.poll_write_ready(cx).is_ready();
        }
        ready
    }

    fn output_suspended(&self) -> bool {
        matches!(&self.pump, Pump::Telnet(t) if t.output_suspended)
    }

    /// Write queued client bytes to the UART; see [`UartQueue::drain_into`].
    pub fn drain_to_uart(&mut self, uart: &mut dyn UartChannel) -> (usize, UartStep) {
        let (written, step) = self.to_uart.drain_into(uart);
        if written > 0 {
            self.stalled_since = None;
        }
        (written, step)
    }

    /// How many raw UART bytes this session can take right now.
    pub fn uart_room(&self) -> usize {
        match &self.pump {
            Pump::Raw => self.to_net.room(),
            // Worst case every byte is an IAC and doubles.
            Pump::Telnet(_) => self.to_net.room() / 2,
            Pump::LinePrinter => usize::MAX,
        }
    }

    /// Queue UART output for the client.
    pub fn deliver_uart(&mut self, bytes: &[u8]) {
        match &mut self.pump {
            Pump::Raw => self.to_net.push_data(bytes),
            Pump::Telnet(telnet) => {
                telnet.encoded.clear();
                FrameCodec::encode_data(bytes, &mut telnet.encoded);
                self.to_net.push_data(&telnet.encoded);
            }
            Pump::LinePrinter => {}
        }
    }

    /// Queue an RFC2217 reply. Ignored outside telnet mode.
    pub fn push_reply(&mut self, reply: &ComPortReply) {
        if matches!(self.pump, Pump::Telnet(_)) {
            let mut bytes = Vec::new();
            reply.encode(&mut bytes);
            self.to_net.push_control(&bytes);
        }
    }

    /// Write queued bytes to the socket until it would block. While the
    /// client has output suspended only control bytes go out.
    pub fn flush_socket(&mut self, now: Instant) -> Result<usize, SessionError> {
        let with_data = !self.output_suspended();
        let mut total = 0;
        while let Some(chunk) = self.to_net.front(with_data) {
            match self.socket.try_write(chunk) {
                Ok(0) => return Err(io::Error::from(ErrorKind::WriteZero).into()),
                Ok(n) => {
                    self.to_net.consume(n);
                    total += n;
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if total > 0 {
            self.last_activity = now;
            self.bytes_to_client += total as u64;
            self.stalled_since = None;
            trace!(session = self.id, bytes = total, "port -> client");
        }
        Ok(total)
    }

    /// True once `timeout` has passed with no bytes in either direction.
    pub fn is_idle(&self, now: Instant, timeout: Option<Duration>) -> bool {
        timeout.is_some_and(|t| now.saturating_duration_since(self.last_activity) >= t)
    }

    fn is_blocked(&self) -> bool {
        let inbound_full = self.role == SessionRole::Primary && self.to_uart.room() == 0;
        inbound_full
            || self.uart_room() == 0
            || self.to_net.control_full()
            || self.to_uart.events_full()
            || (self.half_closed && !self.is_drained())
    }

    /// Track back-pressure; true when it has made no progress for `watchdog`.
    pub fn check_stall(&mut self, now: Instant, watchdog: Option<Duration>) -> bool {
        if !self.is_blocked() {
            self.stalled_since = None;
            return false;
        }
        let since = *self.stalled_since.get_or_insert(now);
        watchdog.is_some_and(|w| now.saturating_duration_since(since) >= w)
    }

    /// Discard buffered bytes; returns how many were dropped.
    pub fn purge(&mut self, direction: PurgeDirection) -> usize {
        let mut dropped = 0;
        if direction.includes_receive() {
            dropped += self.to_net.purge_data();
        }
        if direction.includes_transmit() {
            dropped += self.to_uart.purge_data();
        }
        dropped
    }

    pub fn set_output_suspended(&mut self, suspended: bool) {
        if let Pump::Telnet(telnet) = &mut self.pump {
            telnet.output_suspended = suspended;
        }
    }

    pub fn set_linestate_mask(&mut self, mask: u8) -> u8 {
        if let Pump::Telnet(telnet) = &mut self.pump {
            telnet.linestate_mask = mask;
        }
        mask
    }

    pub fn set_modemstate_mask(&mut self, mask: u8) -> u8 {
        if let Pump::Telnet(telnet) = &mut self.pump {
            telnet.modemstate_mask = mask;
        }
        mask
    }

    /// Line state bits seen since the last query; clears them.
    pub fn take_line_state(&mut self) -> u8 {
        match &mut self.pump {
            Pump::Telnet(telnet) => std::mem::take(&mut telnet.line_bits),
            _ => 0,
        }
    }

    pub fn last_modem_state(&self) -> u8 {
        match &self.pump {
            Pump::Telnet(telnet) => telnet.last_modem.unwrap_or(0),
            _ => 0,
        }
    }

    /// Report UART line errors to a telnet client whose mask asks for them.
    pub fn notify_line_state(&mut self, bits: u8) {
        let Pump::Telnet(telnet) = &mut self.pump else {
            return;
        };
        telnet.line_bits |= bits;
        let masked = bits & telnet.linestate_mask;
        if masked != 0 && !self.to_net.control_full() {
            let mut bytes = Vec::new();
            ComPortReply::LineState(masked).encode(&mut bytes);
            self.to_net.push_control(&bytes);
        }
    }

    /// Report modem line changes (upper nibble of `state`) with delta bits.
    pub fn notify_modem_state(&mut self, state: u8) {
        let Pump::Telnet(telnet) = &mut self.pump else {
            return;
        };
        let state = state & 0xF0;
        if telnet.last_modem == Some(state) {
            return;
        }
        let previous = telnet.last_modem.unwrap_or(0);
        telnet.last_modem = Some(state);
        let delta = ((previous ^ state) >> 4) & 0x0F;
        let masked = (state | delta) & telnet.modemstate_mask;
        if masked != 0 && !self.to_net.control_full() {
            let mut bytes = Vec::new();
            ComPortReply::ModemState(masked).encode(&mut bytes);
            self.to_net.push_control(&bytes);
        }
    }

    /// Best-effort flush in both directions, then shut the socket down.
    pub fn close(mut self, reason: CloseReason, uart: Option<&mut dyn UartChannel>, now: Instant) {
        if let Some(uart) = uart {
            // Events behind the data are moot once the session is gone.
            while let UartStep::Event(_) = self.to_uart.drain_into(uart).1 {}
        }
        if let Err(err) = self.flush_socket(now) {
            debug!(session = self.id, error = %err, "final flush failed");
        }
        match self.socket.into_std() {
            Ok(socket) => {
                let _ = socket.shutdown(Shutdown::Both);
            }
            Err(err) => debug!(session = self.id, error = %err, "socket shutdown failed"),
        }
        info!(
            session = self.id,
            peer = %self.peer,
            role = ?self.role,
            %reason,
            duration_ms = now.saturating_duration_since(self.opened_at).as_millis() as u64,
            bytes_in = self.bytes_from_client,
            bytes_out = self.bytes_to_client,
            "session closed"
        );
    }
}
