//! Telnet framing and the RFC2217 COM-PORT-CONTROL option.
//!
//! - `frame`: byte-level parser and encoders (IAC escaping, negotiation)
//! - `rfc2217`: COM-PORT-OPTION request decoding and reply encoding
//! - `codec`: per-session codec combining both with option negotiation

pub mod codec;
pub mod error;
pub mod frame;
pub mod rfc2217;

pub use codec::{FrameCodec, Inbound};
pub use error::CodecError;
pub use frame::{escape_iac, FrameParser, ParserState, TelnetFrame, Verb, IAC};
pub use rfc2217::{ComPortReply, ControlRequest, NegotiationEvent, COM_PORT_OPTION};
