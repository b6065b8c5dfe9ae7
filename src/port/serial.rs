//! Hardware UART backed by the `serialport` crate.
//!
//! The device is opened with a zero timeout and reads are gated on
//! `bytes_to_read`, so neither direction ever blocks the engine loop.

use super::error::UartError;
use super::traits::{ControlLine, LiveLineParams, ModemState, PurgeDirection, UartChannel};
use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;
use tracing::{debug, warn};

/// A serial device opened through the operating system.
pub struct SerialUart {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    params: LiveLineParams,
    errors: VecDeque<UartError>,
}

impl SerialUart {
    /// Open `device` with the given line parameters.
    ///
    /// # Example
    /// ```no_run
    /// use serial_redirector::port::{LiveLineParams, SerialUart};
    ///
    /// let uart = SerialUart::open("/dev/ttyUSB0", LiveLineParams::default())?;
    /// # Ok::<(), serial_redirector::port::UartError>(())
    /// ```
    pub fn open(device: &str, params: LiveLineParams) -> Result<Self, UartError> {
        let parity = serialport::Parity::try_from(params.parity)?;
        let stop_bits = serialport::StopBits::try_from(params.stop_bits)?;

        let port = serialport::new(device, params.baud)
            .data_bits(params.data_bits.into())
            .flow_control(params.flow_control.into())
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(Duration::ZERO)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => UartError::not_found(device),
                _ => UartError::from(e),
            })?;

        let mut uart = Self {
            port,
            name: device.to_string(),
            params,
            errors: VecDeque::new(),
        };
        uart.params.baud = uart.achieved_baud(params.baud);
        debug!(device, params = %uart.params, "serial device opened");
        Ok(uart)
    }

    fn achieved_baud(&self, requested: u32) -> u32 {
        self.port.baud_rate().unwrap_or(requested)
    }

    fn apply(&mut self, params: LiveLineParams) -> Result<(), UartError> {
        let parity = serialport::Parity::try_from(params.parity)?;
        let stop_bits = serialport::StopBits::try_from(params.stop_bits)?;
        self.port.set_baud_rate(params.baud)?;
        self.port.set_data_bits(params.data_bits.into())?;
        self.port.set_parity(parity)?;
        self.port.set_stop_bits(stop_bits)?;
        self.port.set_flow_control(params.flow_control.into())?;
        Ok(())
    }

    fn record(&mut self, err: UartError) {
        if self.errors.len() < 16 {
            self.errors.push_back(err);
        }
    }
}

impl UartChannel for SerialUart {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> LiveLineParams {
        self.params
    }

    fn configure(&mut self, params: LiveLineParams) -> Result<(), UartError> {
        // Reject what the OS cannot express before touching the device.
        serialport::Parity::try_from(params.parity)?;
        serialport::StopBits::try_from(params.stop_bits)?;

        let previous = self.params;
        if let Err(err) = self.apply(params) {
            if let Err(rollback) = self.apply(previous) {
                warn!(device = %self.name, error = %rollback, "failed to restore line parameters");
            }
            return Err(err);
        }
        self.params = params;
        self.params.baud = self.achieved_baud(params.baud);
        Ok(())
    }

    fn try_read(&mut self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        let available = match self.port.bytes_to_read() {
            Ok(0) => return 0,
            Ok(n) => (n as usize).min(buf.len()),
            Err(e) => {
                self.record(e.into());
                return 0;
            }
        };
        match self.port.read(&mut buf[..available]) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(e) => {
                self.record(e.into());
                0
            }
        }
    }

    fn try_write(&mut self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        match self.port.write(bytes) {
            Ok(n) => n,
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => 0,
            Err(e) => {
                self.record(e.into());
                0
            }
        }
    }

    fn pending_errors(&mut self) -> Option<UartError> {
        self.errors.pop_front()
    }

    fn purge(&mut self, direction: PurgeDirection) -> Result<(), UartError> {
        let which = match direction {
            PurgeDirection::Receive => serialport::ClearBuffer::Input,
            PurgeDirection::Transmit => serialport::ClearBuffer::Output,
            PurgeDirection::Both => serialport::ClearBuffer::All,
        };
        self.port.clear(which)?;
        Ok(())
    }

    fn set_control(&mut self, line: ControlLine, asserted: bool) -> Result<(), UartError> {
        match (line, asserted) {
            (ControlLine::Dtr, level) => self.port.write_data_terminal_ready(level)?,
            (ControlLine::Rts, level) => self.port.write_request_to_send(level)?,
            (ControlLine::Break, true) => self.port.set_break()?,
            (ControlLine::Break, false) => self.port.clear_break()?,
        }
        Ok(())
    }

    fn modem_state(&mut self) -> Option<ModemState> {
        Some(ModemState {
            cts: self.port.read_clear_to_send().ok()?,
            dsr: self.port.read_data_set_ready().ok()?,
            ring: self.port.read_ring_indicator().ok()?,
            carrier: self.port.read_carrier_detect().ok()?,
        })
    }
}

impl std::fmt::Debug for SerialUart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialUart")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}
