//! Shared test utilities for serial-redirector integration tests.
//!
//! This module provides common test infrastructure including:
//! - An engine harness running on localhost with `MockUart` devices
//! - Status polling helpers
//! - A minimal RFC2217 client built on the crate's own frame parser

#![allow(dead_code)]

use parking_lot::Mutex;
use serial_redirector::config::{EngineConfig, PortConfig, PortMode};
use serial_redirector::port::{LiveLineParams, MockUart, UartChannel, UartError};
use serial_redirector::telnet::frame::{DO, SB, SE, WILL};
use serial_redirector::telnet::{escape_iac, FrameParser, TelnetFrame, COM_PORT_OPTION, IAC};
use serial_redirector::{ControlHandle, PortStatus, RedirectorEngine};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Rate at divisor one for the simulated UART clock (80 MHz / 16).
pub const DIVISOR_BASE: u32 = 5_000_000;

/// Generous upper bound for anything that should happen "soon".
pub const WAIT: Duration = Duration::from_secs(3);

/// Pick a currently free TCP port on localhost.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|l| l.local_addr())
        .map(|a| a.port())
        .expect("bind ephemeral port")
}

pub fn engine_config() -> EngineConfig {
    EngineConfig {
        listen_host: "127.0.0.1".into(),
        tick_ms: 1,
        ..EngineConfig::default()
    }
}

/// A raw/telnet/rawlp port on a fresh TCP port, backed by device `uart`.
pub fn port(mode: PortMode, uart: &str) -> PortConfig {
    PortConfig::new(free_port(), uart).with_mode(mode)
}

/// Running engine plus handles to every UART it opened.
pub struct Harness {
    pub control: ControlHandle,
    uarts: Arc<Mutex<HashMap<String, MockUart>>>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Harness {
    pub async fn start(ports: Vec<PortConfig>) -> Self {
        Self::start_with(engine_config(), ports).await
    }

    /// Devices named `sink*` swallow output; everything else loops back.
    pub async fn start_with(config: EngineConfig, ports: Vec<PortConfig>) -> Self {
        let uarts: Arc<Mutex<HashMap<String, MockUart>>> = Arc::default();
        let registry = Arc::clone(&uarts);
        let factory = move |device: &str,
                            params: LiveLineParams|
              -> Result<Box<dyn UartChannel>, UartError> {
            let base = if device.starts_with("sink") {
                MockUart::sink(device)
            } else {
                MockUart::loopback(device)
            };
            let mut uart = base.with_divisor_base(DIVISOR_BASE);
            uart.configure(params)?;
            registry.lock().insert(device.to_string(), uart.clone());
            Ok(Box::new(uart))
        };

        let (mut engine, control) = RedirectorEngine::new(config, factory);
        for port in ports {
            engine.add_port(port).expect("add port");
        }
        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(engine.run(shutdown_rx));
        Self {
            control,
            uarts,
            shutdown,
            task,
        }
    }

    /// The mock behind `device`; clones share state with the engine's copy.
    pub fn uart(&self, device: &str) -> MockUart {
        self.uarts
            .lock()
            .get(device)
            .cloned()
            .expect("unknown device")
    }

    pub async fn connect(&self, tcp_port: u16) -> TcpStream {
        TcpStream::connect(("127.0.0.1", tcp_port))
            .await
            .expect("connect")
    }

    /// Poll the published status until `check` passes.
    pub async fn wait_for(&self, tcp_port: u16, check: impl Fn(&PortStatus) -> bool) -> PortStatus {
        let deadline = tokio::time::Instant::now() + WAIT;
        loop {
            if let Some(status) = self.control.port(tcp_port) {
                if check(&status) {
                    return status;
                }
            }
            if tokio::time::Instant::now() > deadline {
                panic!(
                    "port {tcp_port} never reached the expected state: {:?}",
                    self.control.port(tcp_port)
                );
            }
            sleep(Duration::from_millis(5)).await;
        }
    }

    pub async fn wait_sessions(&self, tcp_port: u16, count: usize) -> PortStatus {
        self.wait_for(tcp_port, |s| s.active_sessions == count)
            .await
    }

    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = timeout(WAIT, self.task).await;
    }
}

/// Wait until `check` holds for the mock's state.
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition never became true");
        sleep(Duration::from_millis(5)).await;
    }
}

pub async fn read_exactly(stream: &mut TcpStream, n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    timeout(WAIT, stream.read_exact(&mut buf))
        .await
        .expect("timed out reading")
        .expect("read failed");
    buf
}

/// Assert nothing arrives for `quiet`.
pub async fn expect_silence(stream: &mut TcpStream, quiet: Duration) {
    let mut buf = [0u8; 64];
    match timeout(quiet, stream.read(&mut buf)).await {
        Err(_) => {}
        Ok(Ok(0)) => panic!("connection closed unexpectedly"),
        Ok(Ok(n)) => panic!("unexpected bytes: {:?}", &buf[..n]),
        Ok(Err(e)) => panic!("read failed: {e}"),
    }
}

/// Assert the server closes the connection (EOF or reset) soon.
pub async fn expect_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 256];
    let deadline = tokio::time::Instant::now() + WAIT;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match timeout(remaining, stream.read(&mut buf)).await {
            Err(_) => panic!("connection was not closed"),
            Ok(Ok(0)) | Ok(Err(_)) => return,
            Ok(Ok(_)) => continue,
        }
    }
}

/// `IAC SB COM-PORT-OPTION <payload> IAC SE` with payload IACs doubled.
pub fn com_port(payload: &[u8]) -> Vec<u8> {
    let mut out = vec![IAC, SB, COM_PORT_OPTION];
    escape_iac(payload, &mut out);
    out.extend_from_slice(&[IAC, SE]);
    out
}

pub fn set_baud(baud: u32) -> Vec<u8> {
    let mut payload = vec![1];
    payload.extend_from_slice(&baud.to_be_bytes());
    com_port(&payload)
}

/// Telnet client speaking just enough RFC2217 for the tests.
pub struct TelnetClient {
    pub stream: TcpStream,
    parser: FrameParser,
    frames: VecDeque<TelnetFrame>,
}

impl TelnetClient {
    /// Connect and negotiate COM-PORT-OPTION the way pyserial does.
    pub async fn connect(harness: &Harness, tcp_port: u16) -> Self {
        let mut client = Self {
            stream: harness.connect(tcp_port).await,
            parser: FrameParser::new(),
            frames: VecDeque::new(),
        };
        client
            .send(&[IAC, WILL, COM_PORT_OPTION, IAC, DO, COM_PORT_OPTION])
            .await;
        client
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    /// Send application data, escaping IAC.
    pub async fn send_data(&mut self, data: &[u8]) {
        let mut out = Vec::new();
        escape_iac(data, &mut out);
        self.send(&out).await;
    }

    async fn fill(&mut self) {
        let mut buf = [0u8; 1024];
        let n = timeout(WAIT, self.stream.read(&mut buf))
            .await
            .expect("timed out waiting for telnet frames")
            .expect("read failed");
        assert!(n > 0, "server closed the connection");
        let mut out = Vec::new();
        self.parser.feed(&buf[..n], &mut out).expect("server sent malformed telnet");
        self.frames.extend(out);
    }

    pub async fn next_frame(&mut self) -> TelnetFrame {
        loop {
            if let Some(frame) = self.frames.pop_front() {
                return frame;
            }
            self.fill().await;
        }
    }

    /// Next COM-PORT-OPTION payload from the server, skipping option
    /// negotiation. Panics if data arrives first.
    pub async fn expect_com_port(&mut self) -> Vec<u8> {
        loop {
            match self.next_frame().await {
                TelnetFrame::Subnegotiation { option, payload } if option == COM_PORT_OPTION => {
                    return payload
                }
                TelnetFrame::Negotiate { .. } => continue,
                other => panic!("expected a COM-PORT-OPTION reply, got {other:?}"),
            }
        }
    }

    /// Collect `n` bytes of application data, skipping negotiation.
    pub async fn read_data(&mut self, n: usize) -> Vec<u8> {
        let mut data = Vec::new();
        while data.len() < n {
            match self.next_frame().await {
                TelnetFrame::Data(bytes) => data.extend_from_slice(&bytes),
                TelnetFrame::Negotiate { .. } => {}
                other => panic!("expected data, got {other:?}"),
            }
        }
        if data.len() > n {
            let rest = data.split_off(n);
            self.frames.push_front(TelnetFrame::Data(rest));
        }
        data
    }
}
