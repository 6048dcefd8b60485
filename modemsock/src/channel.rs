//! Channel slots and the table that owns them.
//!
//! A channel is one logical connection multiplexed over the modem link.
//! Each slot records what the host last learned about that channel and
//! holds the bytes already pulled across the link.

use crate::buffer::ReceiveQueue;
use crate::error::{Error, Result};
use crate::MAX_CHANNELS;

/// Kind of connection requested from the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// Connection-oriented byte stream (TCP).
    Stream,
    /// Connectionless datagrams (UDP).
    Datagram,
}

/// Per-channel state.
#[derive(Debug, Clone)]
pub struct ChannelSlot {
    /// A socket currently owns this slot.
    claimed: bool,

    /// A data notification arrived and has not been reconciled yet.
    pub got_data: bool,

    /// Last known byte count inside the module's own buffer.
    pub sock_available: usize,

    /// Last known connection liveness as reported by the module.
    pub sock_connected: bool,

    /// The module holds this channel open until the host closes it.
    pub opened: bool,

    /// Bytes already transferred from the module.
    pub rx: ReceiveQueue,

    /// Timestamp of the last forced size query (milliseconds).
    pub last_check_ms: u64,
}

impl ChannelSlot {
    /// Creates an unclaimed, idle slot.
    pub const fn new() -> Self {
        Self {
            claimed: false,
            got_data: false,
            sock_available: 0,
            sock_connected: false,
            opened: false,
            rx: ReceiveQueue::new(),
            last_check_ms: 0,
        }
    }

    /// Returns true if a socket owns this slot.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Queues bytes produced by the transport.
    ///
    /// Bytes that do not fit are dropped. Returns the number accepted.
    pub fn push_received(&mut self, data: &[u8]) -> usize {
        let accepted = self.rx.push(data);
        if accepted < data.len() {
            log::warn!(
                "Receive queue overrun: dropped {} of {} bytes",
                data.len() - accepted,
                data.len()
            );
        }
        accepted
    }

    /// Clears all link state, leaving ownership untouched.
    pub fn reset(&mut self) {
        self.got_data = false;
        self.sock_available = 0;
        self.sock_connected = false;
        self.opened = false;
        self.rx.clear();
    }
}

impl Default for ChannelSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed-width table of channel slots, indexed by channel id.
#[derive(Debug)]
pub struct ChannelTable {
    slots: heapless::Vec<ChannelSlot, MAX_CHANNELS>,
}

impl ChannelTable {
    /// Creates a table with `count` slots, clamped to [`MAX_CHANNELS`].
    pub fn new(count: usize) -> Self {
        if count > MAX_CHANNELS {
            log::warn!(
                "Driver reports {} channels, limiting to {}",
                count,
                MAX_CHANNELS
            );
        }

        let mut slots = heapless::Vec::new();
        for _ in 0..core::cmp::min(count, MAX_CHANNELS) {
            let _ = slots.push(ChannelSlot::new());
        }
        Self { slots }
    }

    /// Returns the multiplexing width.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Returns the slot for `mux`.
    pub fn get(&self, mux: u8) -> Option<&ChannelSlot> {
        self.slots.get(mux as usize)
    }

    /// Returns the slot for `mux` mutably.
    pub fn get_mut(&mut self, mux: u8) -> Option<&mut ChannelSlot> {
        self.slots.get_mut(mux as usize)
    }

    /// Iterates over `(mux, slot)` pairs in index order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u8, &mut ChannelSlot)> {
        self.slots
            .iter_mut()
            .enumerate()
            .map(|(mux, slot)| (mux as u8, slot))
    }

    /// Transport entry point: queue bytes that arrived for `mux`.
    ///
    /// Returns the number of bytes accepted; unknown channels accept none.
    pub fn push_received(&mut self, mux: u8, data: &[u8]) -> usize {
        match self.get_mut(mux) {
            Some(slot) => slot.push_received(data),
            None => {
                log::warn!("Data for unknown channel {} discarded", mux);
                0
            }
        }
    }

    /// Takes exclusive ownership of a slot for a new socket.
    pub fn claim(&mut self, mux: u8) -> Result<()> {
        let slot = self.get_mut(mux).ok_or(Error::InvalidChannel)?;
        if slot.claimed {
            return Err(Error::ChannelInUse);
        }
        slot.claimed = true;
        slot.reset();
        Ok(())
    }

    /// Gives up ownership of a slot so it can be claimed again.
    pub fn release(&mut self, mux: u8) {
        if let Some(slot) = self.get_mut(mux) {
            slot.claimed = false;
            slot.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_is_exclusive() {
        let mut table = ChannelTable::new(4);

        assert!(table.claim(1).is_ok());
        assert_eq!(table.claim(1), Err(Error::ChannelInUse));
        assert_eq!(table.claim(4), Err(Error::InvalidChannel));

        table.release(1);
        assert!(table.claim(1).is_ok());
    }

    #[test]
    fn test_width_is_clamped() {
        let table = ChannelTable::new(MAX_CHANNELS + 5);
        assert_eq!(table.len(), MAX_CHANNELS);
    }

    #[test]
    fn test_push_received_drops_overflow() {
        let mut table = ChannelTable::new(2);
        let data = [0x55u8; crate::RX_BUFFER_SIZE + 10];

        assert_eq!(table.push_received(0, &data), crate::RX_BUFFER_SIZE);
        assert_eq!(table.push_received(0, b"more"), 0);
        assert_eq!(table.push_received(7, b"nowhere"), 0);
    }
}
