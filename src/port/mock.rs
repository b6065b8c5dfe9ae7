//! Software UART used for the `loop://` device and for testing.
//!
//! A `MockUart` either loops every transmitted byte back into its receive
//! FIFO (like a TX-RX jumper on real hardware) or swallows it. Clones share
//! state, so a test can keep one clone to inject bytes, errors and
//! back-pressure while the engine drives the other.
//!
//! Transmitted bytes, applied parameters, purges and control line changes
//! are logged for inspection. A long-lived `loop://` port turns the logs
//! off with [`MockUart::without_recording`].

use super::error::UartError;
use super::traits::{
    nearest_divisor_baud, ControlLine, LiveLineParams, ModemState, PurgeDirection, UartChannel,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Receive FIFO depth before overruns are reported.
const DEFAULT_RX_CAPACITY: usize = 64 * 1024;

#[derive(Debug)]
struct MockUartState {
    loopback: bool,
    recording: bool,
    rx: VecDeque<u8>,
    rx_capacity: usize,
    written: Vec<u8>,
    /// Max bytes accepted per `try_write` call; `Some(0)` stalls the transmitter.
    write_limit: Option<usize>,
    errors: VecDeque<UartError>,
    params: LiveLineParams,
    configure_log: Vec<LiveLineParams>,
    /// Rate at divisor one; when set, baud rates are rounded to a divisor.
    divisor_base: Option<u32>,
    max_baud: u32,
    purges: Vec<PurgeDirection>,
    controls: Vec<(ControlLine, bool)>,
    modem: Option<ModemState>,
}

/// In-memory UART with optional loopback.
///
/// # Example
/// ```
/// use serial_redirector::port::{MockUart, UartChannel};
///
/// let mut uart = MockUart::loopback("loop0");
/// assert_eq!(uart.try_write(b"ping"), 4);
///
/// let mut buf = [0u8; 8];
/// let n = uart.try_read(&mut buf);
/// assert_eq!(&buf[..n], b"ping");
/// ```
#[derive(Debug, Clone)]
pub struct MockUart {
    name: String,
    state: Arc<Mutex<MockUartState>>,
}

impl MockUart {
    fn with_mode(name: impl Into<String>, loopback: bool) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(MockUartState {
                loopback,
                recording: true,
                rx: VecDeque::new(),
                rx_capacity: DEFAULT_RX_CAPACITY,
                written: Vec::new(),
                write_limit: None,
                errors: VecDeque::new(),
                params: LiveLineParams::default(),
                configure_log: Vec::new(),
                divisor_base: None,
                max_baud: 4_000_000,
                purges: Vec::new(),
                controls: Vec::new(),
                modem: None,
            })),
        }
    }

    /// A UART whose transmitter is wired to its own receiver.
    pub fn loopback(name: impl Into<String>) -> Self {
        Self::with_mode(name, true)
    }

    /// A UART whose transmitted bytes go nowhere (only into the write log).
    pub fn sink(name: impl Into<String>) -> Self {
        Self::with_mode(name, false)
    }

    /// Stop logging writes, parameters, purges and control changes.
    pub fn without_recording(self) -> Self {
        self.state.lock().recording = false;
        self
    }

    /// Round baud rates to what a divider clocked at `base` can produce.
    pub fn with_divisor_base(self, base: u32) -> Self {
        self.state.lock().divisor_base = Some(base);
        self
    }

    /// Reject baud rates above `max`.
    pub fn with_max_baud(self, max: u32) -> Self {
        self.state.lock().max_baud = max;
        self
    }

    /// Start with `params` already in effect.
    pub fn with_params(self, params: LiveLineParams) -> Self {
        self.state.lock().params = params;
        self
    }

    /// Bytes the (simulated) far end sends to us.
    pub fn inject_rx(&self, bytes: &[u8]) {
        self.state.lock().rx.extend(bytes);
    }

    /// Queue a line error to be reported by `pending_errors`.
    pub fn inject_error(&self, err: UartError) {
        self.state.lock().errors.push_back(err);
    }

    /// Limit how many bytes each `try_write` accepts; `None` removes the limit.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.state.lock().write_limit = limit;
    }

    /// Set the modem input lines reported by `modem_state`.
    pub fn set_modem_state(&self, modem: ModemState) {
        self.state.lock().modem = Some(modem);
    }

    /// Every byte accepted by the transmitter, in order.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    pub fn clear_written(&self) {
        self.state.lock().written.clear();
    }

    /// Parameters successfully applied through `configure`, in order.
    pub fn configure_log(&self) -> Vec<LiveLineParams> {
        self.state.lock().configure_log.clone()
    }

    pub fn purges(&self) -> Vec<PurgeDirection> {
        self.state.lock().purges.clone()
    }

    pub fn controls(&self) -> Vec<(ControlLine, bool)> {
        self.state.lock().controls.clone()
    }

    /// Bytes waiting in the receive FIFO.
    pub fn rx_pending(&self) -> usize {
        self.state.lock().rx.len()
    }
}

impl UartChannel for MockUart {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> LiveLineParams {
        self.state.lock().params
    }

    fn configure(&mut self, params: LiveLineParams) -> Result<(), UartError> {
        let mut state = self.state.lock();
        if params.baud == 0 || params.baud > state.max_baud {
            return Err(UartError::unsupported(format!("baud rate {}", params.baud)));
        }
        let mut applied = params;
        if let Some(base) = state.divisor_base {
            applied.baud = nearest_divisor_baud(base, params.baud);
        }
        state.params = applied;
        if state.recording {
            state.configure_log.push(applied);
        }
        Ok(())
    }

    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        let mut state = self.state.lock();
        let n = buf.len().min(state.rx.len());
        for (slot, byte) in buf.iter_mut().zip(state.rx.drain(..n)) {
            *slot = byte;
        }
        n
    }

    fn try_write(&mut self, bytes: &[u8]) -> usize {
        let mut state = self.state.lock();
        let n = match state.write_limit {
            Some(limit) => bytes.len().min(limit),
            None => bytes.len(),
        };
        let accepted = &bytes[..n];
        if state.recording {
            state.written.extend_from_slice(accepted);
        }
        if state.loopback {
            let room = state.rx_capacity.saturating_sub(state.rx.len());
            if room < accepted.len() {
                state.errors.push_back(UartError::Overrun);
            }
            let kept = accepted.len().min(room);
            state.rx.extend(&accepted[..kept]);
        }
        n
    }

    fn pending_errors(&mut self) -> Option<UartError> {
        self.state.lock().errors.pop_front()
    }

    fn purge(&mut self, direction: PurgeDirection) -> Result<(), UartError> {
        let mut state = self.state.lock();
        if direction.includes_receive() {
            state.rx.clear();
        }
        if state.recording {
            state.purges.push(direction);
        }
        Ok(())
    }

    fn set_control(&mut self, line: ControlLine, asserted: bool) -> Result<(), UartError> {
        let mut state = self.state.lock();
        if state.recording {
            state.controls.push((line, asserted));
        }
        Ok(())
    }

    fn modem_state(&mut self) -> Option<ModemState> {
        self.state.lock().modem
    }
}
