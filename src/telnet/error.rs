//! Codec error types.

use thiserror::Error;

/// Errors raised while decoding the telnet stream.
///
/// Any of these ends the session that produced the bytes; other sessions
/// and the port itself are unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("malformed telnet negotiation: {reason} (byte 0x{byte:02x})")]
    MalformedNegotiation { reason: &'static str, byte: u8 },
}

impl CodecError {
    pub fn malformed(reason: &'static str, byte: u8) -> Self {
        Self::MalformedNegotiation { reason, byte }
    }
}
