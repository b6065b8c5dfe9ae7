//! Core traits and line parameter types for UART abstraction.
//!
//! Defines the `UartChannel` trait that lets real serial devices and the
//! software loopback be driven interchangeably by a port controller.

use super::error::UartError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Line parameters currently in effect on a UART.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveLineParams {
    /// Baud rate (bits per second).
    pub baud: u32,

    /// Number of data bits (5, 6, 7, or 8).
    pub data_bits: DataBits,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,

    /// Flow control mode.
    pub flow_control: FlowControl,
}

impl Default for LiveLineParams {
    fn default() -> Self {
        Self {
            baud: 115_200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

impl fmt::Display for LiveLineParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        write!(
            f,
            "{} {}{}{}",
            self.baud,
            u8::from(self.data_bits),
            parity,
            self.stop_bits
        )?;
        if self.flow_control != FlowControl::None {
            write!(f, " {}", self.flow_control.as_str())?;
        }
        Ok(())
    }
}

/// Number of data bits per character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DataBits {
    Five,
    Six,
    Seven,
    Eight,
}

impl TryFrom<u8> for DataBits {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        match bits {
            5 => Ok(Self::Five),
            6 => Ok(Self::Six),
            7 => Ok(Self::Seven),
            8 => Ok(Self::Eight),
            other => Err(format!("data bits must be 5-8, got {other}")),
        }
    }
}

impl From<DataBits> for u8 {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => 5,
            DataBits::Six => 6,
            DataBits::Seven => 7,
            DataBits::Eight => 8,
        }
    }
}

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => serialport::DataBits::Five,
            DataBits::Six => serialport::DataBits::Six,
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        }
    }
}

/// Flow control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    None,
    #[serde(alias = "hardware", alias = "rts/cts")]
    RtsCts,
    #[serde(alias = "software", alias = "xon/xoff")]
    XonXoff,
}

impl FlowControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::RtsCts => "rtscts",
            Self::XonXoff => "xonxoff",
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => serialport::FlowControl::None,
            FlowControl::XonXoff => serialport::FlowControl::Software,
            FlowControl::RtsCts => serialport::FlowControl::Hardware,
        }
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Odd => "odd",
            Self::Even => "even",
            Self::Mark => "mark",
            Self::Space => "space",
        }
    }
}

impl TryFrom<Parity> for serialport::Parity {
    type Error = UartError;

    fn try_from(parity: Parity) -> Result<Self, Self::Error> {
        match parity {
            Parity::None => Ok(serialport::Parity::None),
            Parity::Odd => Ok(serialport::Parity::Odd),
            Parity::Even => Ok(serialport::Parity::Even),
            Parity::Mark | Parity::Space => Err(UartError::unsupported(format!(
                "{} parity",
                parity.as_str()
            ))),
        }
    }
}

/// Number of stop bits.
///
/// Serialized as a number (`1`, `1.5`, `2`); strings are accepted on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StopBitsRepr", into = "f64")]
pub enum StopBits {
    One,
    OnePointFive,
    Two,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StopBitsRepr {
    Number(f64),
    Text(String),
}

impl TryFrom<StopBitsRepr> for StopBits {
    type Error = String;

    fn try_from(repr: StopBitsRepr) -> Result<Self, Self::Error> {
        let value = match repr {
            StopBitsRepr::Number(n) => n,
            StopBitsRepr::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| format!("stop bits must be 1, 1.5 or 2, got {s:?}"))?,
        };
        if value == 1.0 {
            Ok(Self::One)
        } else if value == 1.5 {
            Ok(Self::OnePointFive)
        } else if value == 2.0 {
            Ok(Self::Two)
        } else {
            Err(format!("stop bits must be 1, 1.5 or 2, got {value}"))
        }
    }
}

impl From<StopBits> for f64 {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => 1.0,
            StopBits::OnePointFive => 1.5,
            StopBits::Two => 2.0,
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => f.write_str("1"),
            Self::OnePointFive => f.write_str("1.5"),
            Self::Two => f.write_str("2"),
        }
    }
}

impl TryFrom<StopBits> for serialport::StopBits {
    type Error = UartError;

    fn try_from(bits: StopBits) -> Result<Self, Self::Error> {
        match bits {
            StopBits::One => Ok(serialport::StopBits::One),
            StopBits::Two => Ok(serialport::StopBits::Two),
            StopBits::OnePointFive => Err(UartError::unsupported("1.5 stop bits")),
        }
    }
}

/// Which buffered bytes a purge discards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurgeDirection {
    /// Bytes received from the line but not yet delivered to the network.
    Receive,
    /// Bytes accepted from the network but not yet on the line.
    Transmit,
    Both,
}

impl PurgeDirection {
    pub fn includes_receive(&self) -> bool {
        matches!(self, Self::Receive | Self::Both)
    }

    pub fn includes_transmit(&self) -> bool {
        matches!(self, Self::Transmit | Self::Both)
    }
}

/// Output control lines that can be driven remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlLine {
    Dtr,
    Rts,
    Break,
}

/// Snapshot of the modem input lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModemState {
    pub cts: bool,
    pub dsr: bool,
    pub ring: bool,
    pub carrier: bool,
}

impl ModemState {
    /// Upper nibble of the RFC2217 NOTIFY-MODEMSTATE byte.
    pub fn to_bits(self) -> u8 {
        let mut bits = 0;
        if self.cts {
            bits |= 0x10;
        }
        if self.dsr {
            bits |= 0x20;
        }
        if self.ring {
            bits |= 0x40;
        }
        if self.carrier {
            bits |= 0x80;
        }
        bits
    }
}

/// Nearest rate a divider-clocked UART can produce for `requested`.
///
/// `base` is the rate produced with a divisor of one (clock / oversampling).
pub fn nearest_divisor_baud(base: u32, requested: u32) -> u32 {
    if requested == 0 {
        return 0;
    }
    let base = u64::from(base);
    let requested = u64::from(requested);
    let divisor = ((base + requested / 2) / requested).max(1);
    (base / divisor) as u32
}

/// Trait for non-blocking UART I/O.
///
/// Every method must return promptly; a UART that cannot accept or supply
/// bytes right now reports zero rather than waiting.
pub trait UartChannel: Send + fmt::Debug {
    /// Device identifier this channel was opened with.
    fn name(&self) -> &str;

    /// Parameters currently in effect. The baud rate is the achieved rate,
    /// which may differ slightly from the one last requested.
    fn params(&self) -> LiveLineParams;

    /// Apply new line parameters atomically.
    ///
    /// On error the previous parameters remain in effect.
    fn configure(&mut self, params: LiveLineParams) -> Result<(), UartError>;

    /// Read whatever is available into `buf`, returning the count (0 if idle).
    fn try_read(&mut self, buf: &mut [u8]) -> usize;

    /// Queue as many of `bytes` as the transmitter accepts, returning the count.
    fn try_write(&mut self, bytes: &[u8]) -> usize;

    /// Take the oldest line or device error observed since the last call.
    fn pending_errors(&mut self) -> Option<UartError>;

    /// Discard buffered bytes in the given direction.
    fn purge(&mut self, direction: PurgeDirection) -> Result<(), UartError>;

    /// Drive an output control line.
    fn set_control(&mut self, line: ControlLine, asserted: bool) -> Result<(), UartError> {
        let _ = asserted;
        Err(UartError::unsupported(format!("{line:?} control")))
    }

    /// Sample the modem input lines, if this UART has them.
    fn modem_state(&mut self) -> Option<ModemState> {
        None
    }
}
