//! UART error types.
//!
//! Line errors (overrun, framing, parity, break) are observations reported by
//! the hardware and never fatal; configuration and device errors are returned
//! from the operations that caused them.

use thiserror::Error;

/// Errors raised by a [`UartChannel`](super::UartChannel).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UartError {
    /// Receive FIFO overflowed and bytes were lost.
    #[error("UART receive overrun")]
    Overrun,

    /// A character arrived without a valid stop bit.
    #[error("UART framing error")]
    Framing,

    /// A character failed the parity check.
    #[error("UART parity error")]
    Parity,

    /// The line was held in the spacing state longer than a character time.
    #[error("UART break condition detected")]
    Break,

    /// The requested line parameter cannot be produced by this UART.
    #[error("Unsupported UART parameter: {0}")]
    UnsupportedParameter(String),

    /// The device named in the configuration does not exist.
    #[error("UART device not found: {0}")]
    NotFound(String),

    /// The device failed underneath us (unplugged, permission lost, ...).
    #[error("UART I/O error: {0}")]
    Io(String),
}

impl UartError {
    /// Create an UnsupportedParameter error from a message.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::UnsupportedParameter(message.into())
    }

    /// Create a NotFound error from a device name.
    pub fn not_found(device: impl Into<String>) -> Self {
        Self::NotFound(device.into())
    }

    /// RFC2217 NOTIFY-LINESTATE bit for line errors, 0 for everything else.
    pub fn line_state_bit(&self) -> u8 {
        match self {
            Self::Overrun => 0x02,
            Self::Parity => 0x04,
            Self::Framing => 0x08,
            Self::Break => 0x10,
            _ => 0,
        }
    }
}

impl From<std::io::Error> for UartError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serialport::Error> for UartError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::NotFound(err.to_string()),
            serialport::ErrorKind::InvalidInput => Self::UnsupportedParameter(err.to_string()),
            _ => Self::Io(err.to_string()),
        }
    }
}
