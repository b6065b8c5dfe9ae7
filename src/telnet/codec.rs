//! Session-level telnet codec.
//!
//! Wraps the frame parser with option negotiation state and turns the
//! stream into ordered [`Inbound`] items: application data and RFC2217
//! events, in the order the client sent them.

use super::error::CodecError;
use super::frame::{escape_iac, negotiation, FrameParser, TelnetFrame, Verb, BRK};
use super::rfc2217::{parse_request, NegotiationEvent, COM_PORT_OPTION};
use tracing::{debug, trace};

pub const OPT_BINARY: u8 = 0;
pub const OPT_ECHO: u8 = 1;
pub const OPT_SGA: u8 = 3;

/// Options this server agrees to in either direction.
const SUPPORTED: [u8; 3] = [OPT_BINARY, OPT_SGA, COM_PORT_OPTION];

/// Decoded client input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Data(Vec<u8>),
    Event(NegotiationEvent),
}

#[derive(Debug, Default, Clone, Copy)]
struct OptionSet([u64; 4]);

impl OptionSet {
    fn get(&self, option: u8) -> bool {
        self.0[(option >> 6) as usize] & (1 << (option & 63)) != 0
    }

    fn set(&mut self, option: u8, enabled: bool) {
        let word = &mut self.0[(option >> 6) as usize];
        if enabled {
            *word |= 1 << (option & 63);
        } else {
            *word &= !(1 << (option & 63));
        }
    }
}

/// Telnet codec for one session.
#[derive(Debug, Default)]
pub struct FrameCodec {
    parser: FrameParser,
    frames: Vec<TelnetFrame>,
    /// Options we have agreed to perform (we sent WILL).
    local: OptionSet,
    /// Options the client has agreed to perform (we sent DO).
    remote: OptionSet,
    replies: Vec<u8>,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `input`, appending data and events to `out` in stream order.
    ///
    /// Option negotiation is answered internally; collect the answers with
    /// [`take_replies`](Self::take_replies). Items decoded before a
    /// malformed byte are still appended before the error is returned.
    pub fn decode(&mut self, input: &[u8], out: &mut Vec<Inbound>) -> Result<(), CodecError> {
        let mut frames = std::mem::take(&mut self.frames);
        let result = self.parser.feed(input, &mut frames);
        let mut failure = None;

        for frame in frames.drain(..) {
            match frame {
                TelnetFrame::Data(bytes) => out.push(Inbound::Data(bytes)),
                TelnetFrame::Negotiate { verb, option } => self.negotiate(verb, option),
                TelnetFrame::Subnegotiation { option, payload } if option == COM_PORT_OPTION => {
                    match parse_request(&payload) {
                        Ok(Some(event)) => {
                            debug!(?event, "com-port request");
                            out.push(Inbound::Event(event));
                        }
                        Ok(None) => {}
                        Err(err) => {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                TelnetFrame::Subnegotiation { option, .. } => {
                    trace!(option, "ignoring subnegotiation for unsupported option");
                }
                TelnetFrame::Command(BRK) => out.push(Inbound::Event(NegotiationEvent::SendBreak)),
                TelnetFrame::Command(command) => trace!(command, "ignoring telnet command"),
            }
        }

        self.frames = frames;
        match failure {
            Some(err) => Err(err),
            None => result,
        }
    }

    /// Bytes owed to the client in answer to option negotiation.
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }

    /// Whether the client has negotiated COM-PORT-OPTION in either direction.
    pub fn com_port_enabled(&self) -> bool {
        self.local.get(COM_PORT_OPTION) || self.remote.get(COM_PORT_OPTION)
    }

    /// Escape UART output for transmission to the client.
    pub fn encode_data(input: &[u8], out: &mut Vec<u8>) {
        escape_iac(input, out);
    }

    // Replies only on state changes, so two compliant peers cannot loop.
    fn negotiate(&mut self, verb: Verb, option: u8) {
        let supported = SUPPORTED.contains(&option);
        let reply = match verb {
            Verb::Will if supported => {
                (!self.remote.get(option)).then(|| {
                    self.remote.set(option, true);
                    Verb::Do
                })
            }
            Verb::Will => Some(Verb::Dont),
            Verb::Wont => self.remote.get(option).then(|| {
                self.remote.set(option, false);
                Verb::Dont
            }),
            Verb::Do if supported => {
                (!self.local.get(option)).then(|| {
                    self.local.set(option, true);
                    Verb::Will
                })
            }
            Verb::Do => Some(Verb::Wont),
            Verb::Dont => self.local.get(option).then(|| {
                self.local.set(option, false);
                Verb::Wont
            }),
        };
        debug!(?verb, option, ?reply, "telnet option negotiation");
        if let Some(reply) = reply {
            self.replies.extend_from_slice(&negotiation(reply, option));
        }
    }
}
