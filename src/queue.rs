//! Bounded per-session byte queues.
//!
//! `UartQueue` carries client bytes toward the UART interleaved with the
//! negotiation events that arrived between them, so a line parameter change
//! only takes effect once every byte sent before it has reached the UART.
//! `NetQueue` carries UART output and protocol replies toward the client.
//!
//! Every lane is bounded: data bytes by the session capacity, control bytes
//! by the same capacity, and queued events by [`MAX_EVENTS`]. Sessions stop
//! reading their socket while any lane is full. Control bytes and events are
//! never dropped once queued, so a lane may overshoot its limit by what one
//! socket read decodes to.

use crate::port::UartChannel;
use crate::telnet::NegotiationEvent;
use std::collections::VecDeque;

/// Negotiation events a session may have queued behind unwritten data.
pub const MAX_EVENTS: usize = 32;

#[derive(Debug)]
enum UartItem {
    Data(Vec<u8>),
    Event(NegotiationEvent),
}

/// Result of draining the UART queue.
#[derive(Debug, PartialEq, Eq)]
pub enum UartStep {
    /// Nothing left to write.
    Idle,
    /// The UART accepted fewer bytes than offered; retry later.
    Blocked,
    /// All data ahead of this event has been written; apply it now.
    Event(NegotiationEvent),
}

/// Client-to-UART queue.
#[derive(Debug)]
pub struct UartQueue {
    items: VecDeque<UartItem>,
    data_bytes: usize,
    events: usize,
    capacity: usize,
}

impl UartQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::new(),
            data_bytes: 0,
            events: 0,
            capacity,
        }
    }

    /// Free data capacity in bytes.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.data_bytes)
    }

    pub fn data_len(&self) -> usize {
        self.data_bytes
    }

    pub fn event_len(&self) -> usize {
        self.events
    }

    pub fn events_full(&self) -> bool {
        self.events >= MAX_EVENTS
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Queue client bytes. Callers size reads by [`room`](Self::room); a
    /// telnet read may decode to slightly less than it read, never more.
    pub fn push_data(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.data_bytes += bytes.len();
        if let Some(UartItem::Data(last)) = self.items.back_mut() {
            last.extend_from_slice(bytes);
        } else {
            self.items.push_back(UartItem::Data(bytes.to_vec()));
        }
    }

    pub fn push_event(&mut self, event: NegotiationEvent) {
        self.events += 1;
        self.items.push_back(UartItem::Event(event));
    }

    /// Write queued data to `uart` until it blocks, the queue empties, or an
    /// event reaches the head (which is then returned).
    pub fn drain_into(&mut self, uart: &mut dyn UartChannel) -> (usize, UartStep) {
        let mut written = 0;
        loop {
            match self.items.front_mut() {
                None => return (written, UartStep::Idle),
                Some(UartItem::Data(bytes)) => {
                    let n = uart.try_write(bytes);
                    written += n;
                    self.data_bytes -= n;
                    if n < bytes.len() {
                        bytes.drain(..n);
                        return (written, UartStep::Blocked);
                    }
                    self.items.pop_front();
                }
                Some(UartItem::Event(_)) => {
                    if let Some(UartItem::Event(event)) = self.items.pop_front() {
                        self.events -= 1;
                        return (written, UartStep::Event(event));
                    }
                }
            }
        }
    }

    /// Drop queued data, keeping events.
    pub fn purge_data(&mut self) -> usize {
        let dropped = self.data_bytes;
        self.items.retain(|item| matches!(item, UartItem::Event(_)));
        self.data_bytes = 0;
        dropped
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Data,
    Control,
}

/// UART-to-client queue.
///
/// Data and control bytes sit in separate lanes. Control chunks go out
/// ahead of queued data, but only between chunks: a chunk that is partly
/// written is always finished first so escape sequences stay whole.
#[derive(Debug)]
pub struct NetQueue {
    data: VecDeque<Vec<u8>>,
    control: VecDeque<Vec<u8>>,
    /// Lane whose head chunk is partly written, and how much of it.
    partial: Option<Kind>,
    head_sent: usize,
    data_bytes: usize,
    control_bytes: usize,
    capacity: usize,
}

impl NetQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: VecDeque::new(),
            control: VecDeque::new(),
            partial: None,
            head_sent: 0,
            data_bytes: 0,
            control_bytes: 0,
            capacity,
        }
    }

    /// Free data capacity in bytes.
    pub fn room(&self) -> usize {
        self.capacity.saturating_sub(self.data_bytes)
    }

    pub fn data_len(&self) -> usize {
        self.data_bytes
    }

    pub fn control_len(&self) -> usize {
        self.control_bytes
    }

    /// True once queued control bytes reach the capacity.
    pub fn control_full(&self) -> bool {
        self.control_bytes >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.control.is_empty()
    }

    pub fn push_data(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.data_bytes += bytes.len();
        Self::append(&mut self.data, bytes, self.partial == Some(Kind::Data));
    }

    /// Queue protocol bytes (negotiation replies, notifications).
    pub fn push_control(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.control_bytes += bytes.len();
        Self::append(&mut self.control, bytes, self.partial == Some(Kind::Control));
    }

    fn append(lane: &mut VecDeque<Vec<u8>>, bytes: &[u8], head_in_flight: bool) {
        // A chunk being written must not grow, or the other lane could
        // wait behind it forever.
        let len = lane.len();
        match lane.back_mut() {
            Some(last) if !(head_in_flight && len == 1) => last.extend_from_slice(bytes),
            _ => lane.push_back(bytes.to_vec()),
        }
    }

    fn head_kind(&self, with_data: bool) -> Option<Kind> {
        if self.partial.is_some() {
            self.partial
        } else if !self.control.is_empty() {
            Some(Kind::Control)
        } else if with_data && !self.data.is_empty() {
            Some(Kind::Data)
        } else {
            None
        }
    }

    fn lane(&self, kind: Kind) -> &VecDeque<Vec<u8>> {
        match kind {
            Kind::Data => &self.data,
            Kind::Control => &self.control,
        }
    }

    /// The next bytes to write. With `with_data` false only control bytes
    /// (and the rest of a partly written data chunk) are offered.
    pub fn front(&self, with_data: bool) -> Option<&[u8]> {
        let kind = self.head_kind(with_data)?;
        self.lane(kind)
            .front()
            .map(|bytes| &bytes[self.head_sent..])
    }

    /// Mark `n` bytes of the last [`front`](Self::front) as written.
    pub fn consume(&mut self, n: usize) {
        let Some(kind) = self.head_kind(true) else {
            return;
        };
        let lane = match kind {
            Kind::Data => &mut self.data,
            Kind::Control => &mut self.control,
        };
        let Some(bytes) = lane.front() else {
            return;
        };
        let remaining = bytes.len() - self.head_sent;
        let n = n.min(remaining);
        if n == remaining {
            lane.pop_front();
            self.partial = None;
            self.head_sent = 0;
        } else if n > 0 {
            self.partial = Some(kind);
            self.head_sent += n;
        }
        match kind {
            Kind::Data => self.data_bytes -= n,
            Kind::Control => self.control_bytes -= n,
        }
    }

    /// Drop queued UART data, keeping control bytes and any partially
    /// written data chunk (cutting it could split an escape sequence).
    pub fn purge_data(&mut self) -> usize {
        let keep = usize::from(self.partial == Some(Kind::Data));
        let dropped: usize = self.data.iter().skip(keep).map(Vec::len).sum();
        self.data.truncate(keep);
        self.data_bytes -= dropped;
        dropped
    }
}
