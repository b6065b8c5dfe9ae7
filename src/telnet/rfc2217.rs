//! RFC2217 COM-PORT-OPTION requests and server replies.
//!
//! Requests from the client arrive as subnegotiation payloads of option 44
//! and are turned into [`NegotiationEvent`]s. Replies carry the server
//! command code (request code + 100) and the value actually in effect.

use super::error::CodecError;
use super::frame::subnegotiation;
use crate::port::{DataBits, FlowControl, Parity, PurgeDirection, StopBits};
use tracing::debug;

pub const COM_PORT_OPTION: u8 = 44;

/// Added to a client command code to form the matching server code.
pub const SERVER_OFFSET: u8 = 100;

pub const SIGNATURE: u8 = 0;
pub const SET_BAUDRATE: u8 = 1;
pub const SET_DATASIZE: u8 = 2;
pub const SET_PARITY: u8 = 3;
pub const SET_STOPSIZE: u8 = 4;
pub const SET_CONTROL: u8 = 5;
pub const NOTIFY_LINESTATE: u8 = 6;
pub const NOTIFY_MODEMSTATE: u8 = 7;
pub const FLOWCONTROL_SUSPEND: u8 = 8;
pub const FLOWCONTROL_RESUME: u8 = 9;
pub const SET_LINESTATE_MASK: u8 = 10;
pub const SET_MODEMSTATE_MASK: u8 = 11;
pub const PURGE_DATA: u8 = 12;

/// SET-CONTROL request values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    QueryFlow,
    Flow(FlowControl),
    QueryBreak,
    Break(bool),
    QueryDtr,
    Dtr(bool),
    QueryRts,
    Rts(bool),
    QueryInboundFlow,
    InboundFlow(FlowControl),
    /// DCD/DTR/DSR flow control; answered with the current outbound setting.
    Unsupported(u8),
}

impl ControlRequest {
    fn from_code(code: u8) -> Self {
        match code {
            0 => Self::QueryFlow,
            1 => Self::Flow(FlowControl::None),
            2 => Self::Flow(FlowControl::XonXoff),
            3 => Self::Flow(FlowControl::RtsCts),
            4 => Self::QueryBreak,
            5 => Self::Break(true),
            6 => Self::Break(false),
            7 => Self::QueryDtr,
            8 => Self::Dtr(true),
            9 => Self::Dtr(false),
            10 => Self::QueryRts,
            11 => Self::Rts(true),
            12 => Self::Rts(false),
            13 => Self::QueryInboundFlow,
            14 => Self::InboundFlow(FlowControl::None),
            15 => Self::InboundFlow(FlowControl::XonXoff),
            16 => Self::InboundFlow(FlowControl::RtsCts),
            other => Self::Unsupported(other),
        }
    }
}

/// A semantic request decoded from the telnet stream.
///
/// `None` values are queries (wire value 0) or values this server does not
/// recognise; both are answered with the current setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationEvent {
    /// Client signature text; empty asks for ours.
    Signature(Vec<u8>),
    SetBaud(Option<u32>),
    SetDataBits(Option<DataBits>),
    SetParity(Option<Parity>),
    SetStopBits(Option<StopBits>),
    SetControl(ControlRequest),
    QueryLineState,
    QueryModemState,
    SuspendOutput,
    ResumeOutput,
    SetLineStateMask(u8),
    SetModemStateMask(u8),
    Purge(PurgeDirection),
    /// Telnet BRK command.
    SendBreak,
}

/// Decode a COM-PORT-OPTION subnegotiation payload.
///
/// Returns `Ok(None)` for commands that need no action (server codes echoed
/// back by a confused peer, unknown commands, invalid purge targets).
pub fn parse_request(payload: &[u8]) -> Result<Option<NegotiationEvent>, CodecError> {
    let Some((&command, value)) = payload.split_first() else {
        return Err(CodecError::malformed("empty COM-PORT-OPTION payload", 0));
    };

    let event = match command {
        SIGNATURE => NegotiationEvent::Signature(value.to_vec()),
        SET_BAUDRATE => {
            let bytes: [u8; 4] = value
                .try_into()
                .map_err(|_| CodecError::malformed("SET-BAUDRATE needs 4 value bytes", command))?;
            let baud = u32::from_be_bytes(bytes);
            NegotiationEvent::SetBaud((baud != 0).then_some(baud))
        }
        SET_DATASIZE => {
            let v = single(command, value)?;
            NegotiationEvent::SetDataBits(DataBits::try_from(v).ok())
        }
        SET_PARITY => NegotiationEvent::SetParity(parity_from_code(single(command, value)?)),
        SET_STOPSIZE => NegotiationEvent::SetStopBits(stop_bits_from_code(single(command, value)?)),
        SET_CONTROL => {
            NegotiationEvent::SetControl(ControlRequest::from_code(single(command, value)?))
        }
        NOTIFY_LINESTATE => NegotiationEvent::QueryLineState,
        NOTIFY_MODEMSTATE => NegotiationEvent::QueryModemState,
        FLOWCONTROL_SUSPEND => NegotiationEvent::SuspendOutput,
        FLOWCONTROL_RESUME => NegotiationEvent::ResumeOutput,
        SET_LINESTATE_MASK => NegotiationEvent::SetLineStateMask(single(command, value)?),
        SET_MODEMSTATE_MASK => NegotiationEvent::SetModemStateMask(single(command, value)?),
        PURGE_DATA => match single(command, value)? {
            1 => NegotiationEvent::Purge(PurgeDirection::Receive),
            2 => NegotiationEvent::Purge(PurgeDirection::Transmit),
            3 => NegotiationEvent::Purge(PurgeDirection::Both),
            other => {
                debug!(value = other, "ignoring PURGE-DATA with unknown target");
                return Ok(None);
            }
        },
        other => {
            debug!(command = other, "ignoring unknown COM-PORT-OPTION command");
            return Ok(None);
        }
    };
    Ok(Some(event))
}

fn single(command: u8, value: &[u8]) -> Result<u8, CodecError> {
    match value {
        [v] => Ok(*v),
        _ => Err(CodecError::malformed(
            "COM-PORT-OPTION command needs exactly 1 value byte",
            command,
        )),
    }
}

pub fn parity_from_code(code: u8) -> Option<Parity> {
    match code {
        1 => Some(Parity::None),
        2 => Some(Parity::Odd),
        3 => Some(Parity::Even),
        4 => Some(Parity::Mark),
        5 => Some(Parity::Space),
        _ => None,
    }
}

pub fn parity_code(parity: Parity) -> u8 {
    match parity {
        Parity::None => 1,
        Parity::Odd => 2,
        Parity::Even => 3,
        Parity::Mark => 4,
        Parity::Space => 5,
    }
}

pub fn stop_bits_from_code(code: u8) -> Option<StopBits> {
    match code {
        1 => Some(StopBits::One),
        2 => Some(StopBits::Two),
        3 => Some(StopBits::OnePointFive),
        _ => None,
    }
}

pub fn stop_bits_code(bits: StopBits) -> u8 {
    match bits {
        StopBits::One => 1,
        StopBits::Two => 2,
        StopBits::OnePointFive => 3,
    }
}

/// SET-CONTROL reply value for a flow control setting.
pub fn flow_code(flow: FlowControl, inbound: bool) -> u8 {
    let base = match flow {
        FlowControl::None => 1,
        FlowControl::XonXoff => 2,
        FlowControl::RtsCts => 3,
    };
    if inbound {
        base + 13
    } else {
        base
    }
}

/// SET-CONTROL reply value for a BREAK, DTR or RTS state.
pub fn line_code(request: ControlRequest, asserted: bool) -> u8 {
    let on = match request {
        ControlRequest::QueryBreak | ControlRequest::Break(_) => 5,
        ControlRequest::QueryDtr | ControlRequest::Dtr(_) => 8,
        _ => 11,
    };
    if asserted {
        on
    } else {
        on + 1
    }
}

/// A server-to-client COM-PORT-OPTION message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComPortReply {
    Signature(String),
    Baud(u32),
    DataBits(DataBits),
    Parity(Parity),
    StopBits(StopBits),
    Control(u8),
    LineState(u8),
    ModemState(u8),
    LineStateMask(u8),
    ModemStateMask(u8),
    Purge(PurgeDirection),
}

impl ComPortReply {
    fn command(&self) -> u8 {
        let request = match self {
            Self::Signature(_) => SIGNATURE,
            Self::Baud(_) => SET_BAUDRATE,
            Self::DataBits(_) => SET_DATASIZE,
            Self::Parity(_) => SET_PARITY,
            Self::StopBits(_) => SET_STOPSIZE,
            Self::Control(_) => SET_CONTROL,
            Self::LineState(_) => NOTIFY_LINESTATE,
            Self::ModemState(_) => NOTIFY_MODEMSTATE,
            Self::LineStateMask(_) => SET_LINESTATE_MASK,
            Self::ModemStateMask(_) => SET_MODEMSTATE_MASK,
            Self::Purge(_) => PURGE_DATA,
        };
        request + SERVER_OFFSET
    }

    /// Append the full `IAC SB 44 ... IAC SE` sequence to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut payload = vec![self.command()];
        match self {
            Self::Signature(text) => payload.extend_from_slice(text.as_bytes()),
            Self::Baud(baud) => payload.extend_from_slice(&baud.to_be_bytes()),
            Self::DataBits(bits) => payload.push(u8::from(*bits)),
            Self::Parity(parity) => payload.push(parity_code(*parity)),
            Self::StopBits(bits) => payload.push(stop_bits_code(*bits)),
            Self::Control(v)
            | Self::LineState(v)
            | Self::ModemState(v)
            | Self::LineStateMask(v)
            | Self::ModemStateMask(v) => payload.push(*v),
            Self::Purge(direction) => payload.push(match direction {
                PurgeDirection::Receive => 1,
                PurgeDirection::Transmit => 2,
                PurgeDirection::Both => 3,
            }),
        }
        subnegotiation(COM_PORT_OPTION, &payload, out);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}
