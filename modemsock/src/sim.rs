//! In-memory module simulation for tests and demos.
//!
//! `SimModem` implements [`ModemDriver`] over plain memory: the far end of
//! each channel is a byte queue that tests fill with [`SimModem::inject`].
//! Depending on the configured policy, notifications either push those
//! bytes straight into the receive queue or merely announce them.
//!
//! `SimModem` and `SimClock` are cheap handles; clone one before handing it
//! to a [`Modem`](crate::Modem) to keep inspecting it afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use modemsock::sim::{SimClock, SimModem};
//!
//! let sim = SimModem::new(AvailabilityPolicy::ReadAndCheckSize, 4);
//! let modem = Modem::new(Box::new(sim.clone()), Box::new(SimClock::new()), Config::default());
//!
//! sim.inject(0, b"hello");
//! assert_eq!(sim.calls().query_available, 0);
//! ```

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::channel::{ChannelSlot, ChannelTable, SocketKind};
use crate::driver::{BufferStatus, Clock, ModemDriver};
use crate::error::{Error, Result};
use crate::policy::AvailabilityPolicy;

/// Number of times each driver entry point was invoked.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimCalls {
    /// `open_channel` calls.
    pub open: usize,
    /// `bind` calls.
    pub bind: usize,
    /// `send` and `send_to` calls.
    pub send: usize,
    /// `pull_into_queue` calls.
    pub pull: usize,
    /// `query_available` calls.
    pub query_available: usize,
    /// `query_connected` calls.
    pub query_connected: usize,
    /// `service_unsolicited` calls.
    pub service: usize,
    /// `clear_input` calls.
    pub clear_input: usize,
    /// `close_channel` calls.
    pub close: usize,
}

/// One transmission recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    /// Channel the data went out on.
    pub mux: u8,
    /// Bytes the module accepted.
    pub data: Vec<u8>,
    /// Explicit destination for datagrams.
    pub destination: Option<(String, u16)>,
}

/// Far end of one channel.
#[derive(Debug, Default)]
struct SimLink {
    open: bool,
    peer_open: bool,
    kind: Option<SocketKind>,
    host: String,
    port: u16,
    pending: VecDeque<u8>,
    data_notice: bool,
    close_notice: bool,
}

#[derive(Debug)]
struct SimState {
    policy: AvailabilityPolicy,
    links: Vec<SimLink>,
    calls: SimCalls,
    sent: Vec<SentPacket>,
    refuse_open: bool,
    send_limit: Option<usize>,
    assign: Option<u8>,
    /// Deliveries held back until a given service pass.
    scheduled: Vec<(usize, u8, Vec<u8>)>,
}

/// Scriptable in-memory module.
#[derive(Debug, Clone)]
pub struct SimModem {
    state: Rc<RefCell<SimState>>,
}

impl SimModem {
    /// Creates a module with `mux_count` idle channels.
    pub fn new(policy: AvailabilityPolicy, mux_count: usize) -> Self {
        let mut links = Vec::with_capacity(mux_count);
        links.resize_with(mux_count, SimLink::default);

        Self {
            state: Rc::new(RefCell::new(SimState {
                policy,
                links,
                calls: SimCalls::default(),
                sent: Vec::new(),
                refuse_open: false,
                send_limit: None,
                assign: None,
                scheduled: Vec::new(),
            })),
        }
    }

    /// Peer sends `data` on `mux`; a data notification becomes pending.
    pub fn inject(&self, mux: u8, data: &[u8]) {
        let mut state = self.state.borrow_mut();
        if let Some(link) = state.links.get_mut(mux as usize) {
            link.pending.extend(data.iter().copied());
            link.data_notice = true;
        }
    }

    /// Peer sends `data` on `mux` just before the `passes`-th notification
    /// service from now.
    pub fn inject_after_passes(&self, mux: u8, data: &[u8], passes: usize) {
        let mut state = self.state.borrow_mut();
        let due = state.calls.service + passes;
        state.scheduled.push((due, mux, data.to_vec()));
    }

    /// Peer closes `mux`; a close notification becomes pending.
    pub fn peer_close(&self, mux: u8) {
        let mut state = self.state.borrow_mut();
        if let Some(link) = state.links.get_mut(mux as usize) {
            link.peer_open = false;
            link.close_notice = true;
        }
    }

    /// Bytes still held module-side for `mux`.
    pub fn pending(&self, mux: u8) -> usize {
        self.state
            .borrow()
            .links
            .get(mux as usize)
            .map_or(0, |link| link.pending.len())
    }

    /// True if the host has `mux` open on the module.
    pub fn is_open(&self, mux: u8) -> bool {
        self.state
            .borrow()
            .links
            .get(mux as usize)
            .is_some_and(|link| link.open)
    }

    /// Remote endpoint `mux` was last opened towards.
    pub fn target(&self, mux: u8) -> Option<(String, u16)> {
        let state = self.state.borrow();
        let link = state.links.get(mux as usize)?;
        link.kind.map(|_| (link.host.clone(), link.port))
    }

    /// Call counters so far.
    pub fn calls(&self) -> SimCalls {
        self.state.borrow().calls
    }

    /// Every transmission so far, in order.
    pub fn sent(&self) -> Vec<SentPacket> {
        self.state.borrow().sent.clone()
    }

    /// Makes subsequent opens fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.borrow_mut().refuse_open = refuse;
    }

    /// Caps how many bytes a single send accepts.
    pub fn limit_send(&self, limit: Option<usize>) {
        self.state.borrow_mut().send_limit = limit;
    }

    /// Makes subsequent opens report `mux` instead of the requested one.
    pub fn assign_channel(&self, mux: Option<u8>) {
        self.state.borrow_mut().assign = mux;
    }
}

impl SimState {
    fn link(&mut self, mux: u8) -> Result<&mut SimLink> {
        self.links.get_mut(mux as usize).ok_or(Error::InvalidChannel)
    }

    fn deliver_due(&mut self) {
        let pass = self.calls.service;
        let (due, later): (Vec<_>, Vec<_>) = self
            .scheduled
            .drain(..)
            .partition(|(at, _, _)| *at <= pass);
        self.scheduled = later;

        for (_, mux, data) in due {
            if let Some(link) = self.links.get_mut(mux as usize) {
                link.pending.extend(data);
                link.data_notice = true;
            }
        }
    }

    fn establish(&mut self, mux: u8, kind: SocketKind, host: &str, port: u16) -> Result<u8> {
        if self.refuse_open {
            return Err(Error::ConnectFailed);
        }
        let target = self.assign.unwrap_or(mux);
        let link = self.link(target)?;
        *link = SimLink {
            open: true,
            peer_open: true,
            kind: Some(kind),
            host: String::from(host),
            port,
            ..SimLink::default()
        };
        Ok(target)
    }

    fn transmit(
        &mut self,
        mux: u8,
        data: &[u8],
        destination: Option<(String, u16)>,
    ) -> Result<usize> {
        self.calls.send += 1;
        let stream = destination.is_none();
        let link = self.link(mux)?;
        if !link.open || (stream && !link.peer_open) {
            return Err(Error::NotConnected);
        }

        let accepted = self.send_limit.map_or(data.len(), |limit| limit.min(data.len()));
        self.sent.push(SentPacket {
            mux,
            data: data[..accepted].to_vec(),
            destination,
        });
        Ok(accepted)
    }
}

impl ModemDriver for SimModem {
    fn policy(&self) -> AvailabilityPolicy {
        self.state.borrow().policy
    }

    fn mux_count(&self) -> usize {
        self.state.borrow().links.len()
    }

    fn open_channel(
        &mut self,
        mux: u8,
        kind: SocketKind,
        host: &str,
        port: u16,
        _timeout_ms: u32,
    ) -> Result<u8> {
        let mut state = self.state.borrow_mut();
        state.calls.open += 1;
        state.establish(mux, kind, host, port)
    }

    fn bind(&mut self, mux: u8, local_port: u16) -> Result<u8> {
        let mut state = self.state.borrow_mut();
        state.calls.bind += 1;
        state.establish(mux, SocketKind::Datagram, "", local_port)
    }

    fn send(&mut self, mux: u8, data: &[u8]) -> Result<usize> {
        self.state.borrow_mut().transmit(mux, data, None)
    }

    fn send_to(&mut self, mux: u8, data: &[u8], host: &str, port: u16) -> Result<usize> {
        self.state
            .borrow_mut()
            .transmit(mux, data, Some((String::from(host), port)))
    }

    fn pull_into_queue(&mut self, mux: u8, slot: &mut ChannelSlot, max: usize) -> Result<usize> {
        let mut state = self.state.borrow_mut();
        state.calls.pull += 1;
        let link = state.link(mux)?;

        let count = max.min(link.pending.len()).min(slot.rx.free());
        let chunk: Vec<u8> = link.pending.drain(..count).collect();
        slot.push_received(&chunk);
        slot.sock_available = link.pending.len();
        Ok(count)
    }

    fn query_available(&mut self, mux: u8) -> Result<BufferStatus> {
        let mut state = self.state.borrow_mut();
        state.calls.query_available += 1;
        let link = state.link(mux)?;
        Ok(BufferStatus {
            available: link.pending.len(),
            connected: link.open && link.peer_open,
        })
    }

    fn query_connected(&mut self, mux: u8) -> bool {
        let mut state = self.state.borrow_mut();
        state.calls.query_connected += 1;
        state
            .links
            .get(mux as usize)
            .is_some_and(|link| link.open && link.peer_open)
    }

    fn service_unsolicited(&mut self, channels: &mut ChannelTable, _timeout_ms: u32) {
        let mut state = self.state.borrow_mut();
        state.calls.service += 1;
        state.deliver_due();
        let policy = state.policy;

        for (mux, link) in state.links.iter_mut().enumerate() {
            let mux = mux as u8;
            if link.data_notice {
                link.data_notice = false;
                match policy {
                    AvailabilityPolicy::NoModemBuffer => {
                        let data: Vec<u8> = link.pending.drain(..).collect();
                        channels.push_received(mux, &data);
                    }
                    AvailabilityPolicy::ReadNoCheck => {
                        if let Some(slot) = channels.get_mut(mux) {
                            slot.got_data = true;
                            slot.sock_available = link.pending.len();
                        }
                    }
                    AvailabilityPolicy::ReadAndCheckSize => {
                        if let Some(slot) = channels.get_mut(mux) {
                            slot.got_data = true;
                        }
                    }
                }
            }
            if link.close_notice {
                link.close_notice = false;
                if let Some(slot) = channels.get_mut(mux) {
                    slot.sock_connected = false;
                }
            }
        }
    }

    fn has_pending_input(&self) -> bool {
        self.state
            .borrow()
            .links
            .iter()
            .any(|link| link.data_notice || link.close_notice)
    }

    fn clear_input(&mut self) {
        self.state.borrow_mut().calls.clear_input += 1;
    }

    fn close_channel(&mut self, mux: u8) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.calls.close += 1;
        let link = state.link(mux)?;
        link.open = false;
        link.pending.clear();
        link.data_notice = false;
        link.close_notice = false;
        Ok(())
    }
}

/// Manual clock that advances a fixed step on every yield.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Rc<Cell<u64>>,
    step_ms: u64,
}

impl SimClock {
    /// Creates a clock at 0 ms advancing 1 ms per yield.
    pub fn new() -> Self {
        Self::with_step(1)
    }

    /// Creates a clock at 0 ms advancing `step_ms` per yield.
    pub fn with_step(step_ms: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(0)),
            step_ms,
        }
    }

    /// Moves time forward.
    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }

    fn yield_now(&self) {
        self.advance(self.step_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_policy_delivers_on_service() {
        let mut sim = SimModem::new(AvailabilityPolicy::NoModemBuffer, 2);
        let mut table = ChannelTable::new(2);
        sim.open_channel(1, SocketKind::Stream, "a", 1, 0).unwrap();
        sim.inject(1, b"abc");

        sim.service_unsolicited(&mut table, 0);

        assert_eq!(table.get(1).unwrap().rx.len(), 3);
        assert_eq!(sim.pending(1), 0);
    }

    #[test]
    fn test_pull_respects_queue_space() {
        let mut sim = SimModem::new(AvailabilityPolicy::ReadAndCheckSize, 1);
        let mut slot = ChannelSlot::new();
        sim.open_channel(0, SocketKind::Stream, "a", 1, 0).unwrap();
        sim.inject(0, &[1u8; 100]);

        let n = sim.pull_into_queue(0, &mut slot, 100).unwrap();

        assert_eq!(n, crate::RX_BUFFER_SIZE);
        assert_eq!(slot.sock_available, 100 - crate::RX_BUFFER_SIZE);
    }

    #[test]
    fn test_scheduled_delivery_waits_for_pass() {
        let mut sim = SimModem::new(AvailabilityPolicy::NoModemBuffer, 1);
        let mut table = ChannelTable::new(1);
        sim.open_channel(0, SocketKind::Stream, "a", 1, 0).unwrap();
        sim.inject_after_passes(0, b"late", 2);

        sim.service_unsolicited(&mut table, 0);
        assert_eq!(table.get(0).unwrap().rx.len(), 0);

        sim.service_unsolicited(&mut table, 0);
        assert_eq!(table.get(0).unwrap().rx.len(), 4);
    }

    #[test]
    fn test_clock_steps_on_yield() {
        let clock = SimClock::with_step(5);
        clock.yield_now();
        clock.advance(10);
        assert_eq!(clock.now_ms(), 15);
        assert_eq!(clock.elapsed_since(5), 10);
    }
}
