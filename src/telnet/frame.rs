//! Byte-level telnet framing.
//!
//! `FrameParser` is a resumable state machine: it can be fed arbitrary
//! slices of the stream and picks up where the previous slice ended, so
//! escape sequences split across TCP reads decode correctly.

use super::error::CodecError;
use memchr::memchr;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const BRK: u8 = 243;
pub const NOP: u8 = 241;
pub const SE: u8 = 240;

/// Longest subnegotiation payload accepted before the stream is rejected.
pub const MAX_SUBNEGOTIATION: usize = 256;

/// Option negotiation verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

impl Verb {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            WILL => Some(Self::Will),
            WONT => Some(Self::Wont),
            DO => Some(Self::Do),
            DONT => Some(Self::Dont),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Will => WILL,
            Self::Wont => WONT,
            Self::Do => DO,
            Self::Dont => DONT,
        }
    }
}

/// One decoded unit of the telnet stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetFrame {
    /// Application bytes with IAC escaping already removed.
    Data(Vec<u8>),
    Negotiate { verb: Verb, option: u8 },
    Subnegotiation { option: u8, payload: Vec<u8> },
    /// Two-byte command such as NOP, BRK or AYT.
    Command(u8),
}

/// What the byte after `IAC <command>` completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCommand {
    Verb(Verb),
    Subnegotiation,
}

/// Parser position within the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Data,
    SawEscape,
    SawEscapeCommand(PendingCommand),
    InSubnegotiation,
    SubnegotiationEscape,
}

#[derive(Debug)]
pub struct FrameParser {
    state: ParserState,
    option: u8,
    payload: Vec<u8>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            state: ParserState::Data,
            option: 0,
            payload: Vec::new(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Decode `input`, appending frames to `out`.
    ///
    /// Frames completed before a malformed byte are still appended; the
    /// parser resets to `Data` after an error.
    pub fn feed(&mut self, input: &[u8], out: &mut Vec<TelnetFrame>) -> Result<(), CodecError> {
        let mut i = 0;
        while i < input.len() {
            if self.state == ParserState::Data {
                let rest = &input[i..];
                match memchr(IAC, rest) {
                    Some(pos) => {
                        push_data(out, &rest[..pos]);
                        self.state = ParserState::SawEscape;
                        i += pos + 1;
                    }
                    None => {
                        push_data(out, rest);
                        i = input.len();
                    }
                }
                continue;
            }

            let byte = input[i];
            i += 1;
            if let Err(err) = self.step(byte, out) {
                self.state = ParserState::Data;
                self.payload.clear();
                return Err(err);
            }
        }
        Ok(())
    }

    fn step(&mut self, byte: u8, out: &mut Vec<TelnetFrame>) -> Result<(), CodecError> {
        self.state = match self.state {
            ParserState::Data => {
                if byte == IAC {
                    ParserState::SawEscape
                } else {
                    push_data(out, &[byte]);
                    ParserState::Data
                }
            }
            ParserState::SawEscape => match byte {
                IAC => {
                    push_data(out, &[IAC]);
                    ParserState::Data
                }
                SB => ParserState::SawEscapeCommand(PendingCommand::Subnegotiation),
                NOP..=GA => {
                    out.push(TelnetFrame::Command(byte));
                    ParserState::Data
                }
                _ => match Verb::from_byte(byte) {
                    Some(verb) => ParserState::SawEscapeCommand(PendingCommand::Verb(verb)),
                    None => return Err(CodecError::malformed("unexpected byte after IAC", byte)),
                },
            },
            ParserState::SawEscapeCommand(PendingCommand::Verb(verb)) => {
                out.push(TelnetFrame::Negotiate {
                    verb,
                    option: byte,
                });
                ParserState::Data
            }
            ParserState::SawEscapeCommand(PendingCommand::Subnegotiation) => {
                self.option = byte;
                self.payload.clear();
                ParserState::InSubnegotiation
            }
            ParserState::InSubnegotiation => {
                if byte == IAC {
                    ParserState::SubnegotiationEscape
                } else {
                    self.push_payload(byte)?;
                    ParserState::InSubnegotiation
                }
            }
            ParserState::SubnegotiationEscape => match byte {
                IAC => {
                    self.push_payload(IAC)?;
                    ParserState::InSubnegotiation
                }
                SE => {
                    out.push(TelnetFrame::Subnegotiation {
                        option: self.option,
                        payload: std::mem::take(&mut self.payload),
                    });
                    ParserState::Data
                }
                _ => {
                    return Err(CodecError::malformed(
                        "unexpected byte after IAC in subnegotiation",
                        byte,
                    ))
                }
            },
        };
        Ok(())
    }

    fn push_payload(&mut self, byte: u8) -> Result<(), CodecError> {
        if self.payload.len() >= MAX_SUBNEGOTIATION {
            return Err(CodecError::malformed("subnegotiation too long", byte));
        }
        self.payload.push(byte);
        Ok(())
    }
}

fn push_data(out: &mut Vec<TelnetFrame>, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    if let Some(TelnetFrame::Data(last)) = out.last_mut() {
        last.extend_from_slice(bytes);
    } else {
        out.push(TelnetFrame::Data(bytes.to_vec()));
    }
}

/// Append `input` to `out`, doubling every IAC byte.
pub fn escape_iac(input: &[u8], out: &mut Vec<u8>) {
    let mut rest = input;
    while let Some(pos) = memchr(IAC, rest) {
        out.extend_from_slice(&rest[..=pos]);
        out.push(IAC);
        rest = &rest[pos + 1..];
    }
    out.extend_from_slice(rest);
}

/// `IAC <verb> <option>`.
pub fn negotiation(verb: Verb, option: u8) -> [u8; 3] {
    [IAC, verb.as_byte(), option]
}

/// `IAC SB <option> <payload, escaped> IAC SE`.
pub fn subnegotiation(option: u8, payload: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&[IAC, SB, option]);
    escape_iac(payload, out);
    out.extend_from_slice(&[IAC, SE]);
}
