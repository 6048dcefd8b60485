//! Modem hub: driver, clock and channel table shared by all sockets.
//!
//! This module also carries the maintenance engine and the receive-side
//! state machine. Every socket operation that waits for data funnels
//! through here, so all three availability policies are resolved in one
//! place.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt;

use crate::channel::{ChannelTable, SocketKind};
use crate::config::Config;
use crate::driver::{Clock, ModemDriver};
use crate::error::{Error, Result};
use crate::policy::AvailabilityPolicy;

/// Handle through which sockets share one modem.
///
/// Access is single-threaded; sockets borrow the modem for the duration of
/// one operation.
pub type SharedModem = Rc<RefCell<Modem>>;

/// Driver capability plus the host-side state of every channel.
pub struct Modem {
    /// Module command interface.
    driver: Box<dyn ModemDriver>,

    /// Time source and yield point.
    clock: Box<dyn Clock>,

    /// One slot per multiplexed channel.
    channels: ChannelTable,

    /// Resolved once from the driver.
    policy: AvailabilityPolicy,

    /// Timing configuration.
    config: Config,
}

impl fmt::Debug for Modem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modem")
            .field("policy", &self.policy)
            .field("channels", &self.channels)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Modem {
    /// Creates a modem hub around `driver`.
    pub fn new(driver: Box<dyn ModemDriver>, clock: Box<dyn Clock>, config: Config) -> Self {
        let policy = driver.policy();
        let channels = ChannelTable::new(driver.mux_count());
        log::debug!(
            "Modem ready: policy={:?}, channels={}",
            policy,
            channels.len()
        );

        Self {
            driver,
            clock,
            channels,
            policy,
            config,
        }
    }

    /// Wraps the modem in a shareable handle for socket construction.
    pub fn into_shared(self) -> SharedModem {
        Rc::new(RefCell::new(self))
    }

    /// Returns the active availability policy.
    pub fn policy(&self) -> AvailabilityPolicy {
        self.policy
    }

    /// Returns the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the channel table.
    pub fn channels(&self) -> &ChannelTable {
        &self.channels
    }

    /// Returns the channel table mutably, for transports that push data.
    pub fn channels_mut(&mut self) -> &mut ChannelTable {
        &mut self.channels
    }

    /// Current time from the modem's clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Runs one maintenance pass.
    ///
    /// Reconciles channel state with the module and processes pending
    /// notifications. Always bounded by the configured short waits.
    pub fn maintain(&mut self) {
        match self.policy {
            AvailabilityPolicy::ReadAndCheckSize => {
                for (mux, slot) in self.channels.iter_mut() {
                    if !slot.is_claimed() || !slot.got_data {
                        continue;
                    }
                    slot.got_data = false;
                    match self.driver.query_available(mux) {
                        Ok(status) => {
                            slot.sock_available = status.available;
                            slot.sock_connected = status.connected;
                            log::trace!(
                                "Channel {}: module holds {} bytes, connected={}",
                                mux,
                                status.available,
                                status.connected
                            );
                        }
                        Err(e) => log::warn!("Channel {}: size query failed: {}", mux, e),
                    }
                }

                let start = self.clock.now_ms();
                let budget = self.config.maintain_wait_ms as u64;
                loop {
                    self.driver
                        .service_unsolicited(&mut self.channels, self.config.check_size_wait_ms);
                    if !self.driver.has_pending_input() || self.clock.elapsed_since(start) >= budget
                    {
                        break;
                    }
                    self.clock.yield_now();
                }
            }
            AvailabilityPolicy::NoModemBuffer | AvailabilityPolicy::ReadNoCheck => {
                self.driver
                    .service_unsolicited(&mut self.channels, self.config.maintain_wait_ms);
            }
        }
    }

    pub(crate) fn claim(&mut self, mux: u8) -> Result<()> {
        self.channels.claim(mux)?;
        let now = self.clock.now_ms();
        if let Some(slot) = self.channels.get_mut(mux) {
            slot.last_check_ms = now;
        }
        Ok(())
    }

    pub(crate) fn release(&mut self, mux: u8) {
        self.channels.release(mux);
    }

    /// True if the channel was last seen open.
    pub(crate) fn is_link_up(&self, mux: u8) -> bool {
        self.channels.get(mux).is_some_and(|slot| slot.sock_connected)
    }

    /// True if the module still holds the channel for us, even after the
    /// peer went away.
    pub(crate) fn is_held(&self, mux: u8) -> bool {
        self.channels.get(mux).is_some_and(|slot| slot.opened)
    }

    /// Opens a connection and binds the result to a slot.
    pub(crate) fn open(
        &mut self,
        mux: u8,
        kind: SocketKind,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<u8> {
        self.channels
            .get_mut(mux)
            .ok_or(Error::InvalidChannel)?
            .reset();

        let assigned = self
            .driver
            .open_channel(mux, kind, host, port, timeout_ms)
            .inspect_err(|e| log::debug!("Channel {}: open {}:{} failed: {}", mux, host, port, e))?;

        log::debug!("Channel {}: {:?} open to {}:{}", assigned, kind, host, port);
        self.adopt(mux, assigned)
    }

    /// Opens a local datagram binding and binds the result to a slot.
    pub(crate) fn bind(&mut self, mux: u8, local_port: u16) -> Result<u8> {
        self.channels
            .get_mut(mux)
            .ok_or(Error::InvalidChannel)?
            .reset();

        let assigned = self
            .driver
            .bind(mux, local_port)
            .inspect_err(|e| log::debug!("Channel {}: bind :{} failed: {}", mux, local_port, e))?;

        log::debug!("Channel {}: bound to local port {}", assigned, local_port);
        self.adopt(mux, assigned)
    }

    /// Moves the slot claim if the module chose a different channel id.
    fn adopt(&mut self, mux: u8, assigned: u8) -> Result<u8> {
        if assigned != mux {
            if let Err(e) = self.channels.claim(assigned) {
                log::warn!("Module assigned channel {} which is not free", assigned);
                let _ = self.driver.close_channel(assigned);
                return Err(e);
            }
            self.channels.release(mux);
        }

        let now = self.clock.now_ms();
        let slot = self.channels.get_mut(assigned).ok_or(Error::InvalidChannel)?;
        slot.opened = true;
        slot.sock_connected = true;
        slot.last_check_ms = now;
        Ok(assigned)
    }

    /// Sends stream data after one maintenance pass.
    pub(crate) fn send(&mut self, mux: u8, data: &[u8]) -> Result<usize> {
        self.clock.yield_now();
        self.maintain();
        let sent = self.driver.send(mux, data)?;
        log::trace!("Channel {}: sent {}/{} bytes", mux, sent, data.len());
        Ok(sent)
    }

    /// Sends one datagram after one maintenance pass.
    pub(crate) fn send_to(
        &mut self,
        mux: u8,
        data: &[u8],
        host: &str,
        port: u16,
    ) -> Result<usize> {
        self.clock.yield_now();
        self.maintain();
        let sent = self.driver.send_to(mux, data, host, port)?;
        log::trace!(
            "Channel {}: datagram {}/{} bytes to {}:{}",
            mux,
            sent,
            data.len(),
            host,
            port
        );
        Ok(sent)
    }

    pub(crate) fn flush(&mut self) {
        self.driver.flush();
    }

    /// Bytes counted as ready on `mux` without running maintenance.
    fn ready(&self, mux: u8) -> usize {
        match self.channels.get(mux) {
            Some(slot) if self.policy.has_module_buffer() => slot.rx.len() + slot.sock_available,
            Some(slot) => slot.rx.len(),
            None => 0,
        }
    }

    /// Raises `got_data` on `mux` once per poll interval.
    fn force_size_check(&mut self, mux: u8) {
        let now = self.clock.now_ms();
        let interval = self.config.poll_interval_ms as u64;
        if let Some(slot) = self.channels.get_mut(mux) {
            if now.wrapping_sub(slot.last_check_ms) > interval {
                slot.got_data = true;
                slot.last_check_ms = now;
            }
        }
    }

    /// Bytes ready to read on `mux`, per the active policy.
    pub(crate) fn available(&mut self, mux: u8) -> usize {
        self.clock.yield_now();
        let Some(slot) = self.channels.get(mux) else {
            return 0;
        };
        if !slot.rx.is_empty() {
            return self.ready(mux);
        }

        match self.policy {
            AvailabilityPolicy::NoModemBuffer => {
                if slot.sock_connected {
                    self.maintain();
                }
            }
            AvailabilityPolicy::ReadNoCheck => self.maintain(),
            AvailabilityPolicy::ReadAndCheckSize => {
                self.force_size_check(mux);
                self.maintain();
            }
        }
        self.ready(mux)
    }

    /// Copies up to `buf.len()` bytes out of `mux`.
    ///
    /// Returns the number of bytes copied; 0 is not an error.
    pub(crate) fn read(&mut self, mux: u8, buf: &mut [u8], timeout_ms: u32) -> usize {
        self.clock.yield_now();
        if buf.is_empty() || self.channels.get(mux).is_none() {
            return 0;
        }

        let copied = if self.policy.has_module_buffer() {
            self.read_pulled(mux, buf)
        } else {
            self.read_pushed(mux, buf, timeout_ms)
        };
        log::trace!("Channel {}: read {} bytes", mux, copied);
        copied
    }

    /// Read loop for modules that push everything to the host.
    fn read_pushed(&mut self, mux: u8, buf: &mut [u8], timeout_ms: u32) -> usize {
        let start = self.clock.now_ms();
        let mut count = 0;

        loop {
            let Some(slot) = self.channels.get_mut(mux) else {
                break;
            };
            count += slot.rx.read(&mut buf[count..]);
            if count == buf.len() {
                break;
            }
            // Nothing else can arrive on a closed channel.
            if !slot.sock_connected || self.clock.elapsed_since(start) >= timeout_ms as u64 {
                break;
            }
            self.maintain();
            self.clock.yield_now();
        }

        count
    }

    /// Read loop for modules that hold data until the host pulls it.
    fn read_pulled(&mut self, mux: u8, buf: &mut [u8]) -> usize {
        let mut count = 0;

        while count < buf.len() {
            let Some(slot) = self.channels.get_mut(mux) else {
                break;
            };
            let chunk = slot.rx.read(&mut buf[count..]);
            if chunk > 0 {
                count += chunk;
                continue;
            }

            // Some modules never announce new data; ask anyway now and then.
            if self.policy.can_query_size() {
                self.force_size_check(mux);
            }
            self.maintain();
            if self.pull(mux) == 0 {
                break;
            }
        }

        count
    }

    /// Moves module-resident bytes into the receive queue.
    fn pull(&mut self, mux: u8) -> usize {
        let Some(slot) = self.channels.get_mut(mux) else {
            return 0;
        };
        let want = core::cmp::min(slot.rx.free(), slot.sock_available);
        if want == 0 {
            return 0;
        }

        match self.driver.pull_into_queue(mux, slot, want) {
            Ok(n) => n,
            Err(e) => {
                log::warn!("Channel {}: pull failed: {}", mux, e);
                0
            }
        }
    }

    /// Returns the next byte without consuming it.
    pub(crate) fn peek(&mut self, mux: u8) -> Option<u8> {
        if self.available(mux) > 0 && self.policy.has_module_buffer() {
            let empty = self.channels.get(mux).is_some_and(|slot| slot.rx.is_empty());
            if empty {
                self.pull(mux);
            }
        }
        self.channels.get(mux).and_then(|slot| slot.rx.peek())
    }

    /// True while the channel is open or still has unread data.
    pub(crate) fn connected(&mut self, mux: u8) -> bool {
        if self.available(mux) > 0 {
            return true;
        }

        if self.policy.trusts_reconciled_state() {
            // A notification seen during the last pass is not reconciled yet.
            let stale = self.channels.get(mux).is_some_and(|slot| slot.got_data);
            if stale {
                self.maintain();
                if self.ready(mux) > 0 {
                    return true;
                }
            }
            return self.is_link_up(mux);
        }

        let alive = self.driver.query_connected(mux);
        if let Some(slot) = self.channels.get_mut(mux) {
            slot.sock_connected = alive;
        }
        alive
    }

    /// Drains what the module still holds for `mux`, then closes it.
    pub(crate) fn close(&mut self, mux: u8, max_wait_ms: u32) {
        self.clock.yield_now();
        let start = self.clock.now_ms();
        let budget = max_wait_ms as u64;
        let mut discarded = 0;

        if self.policy.has_module_buffer() {
            loop {
                let Some(slot) = self.channels.get_mut(mux) else {
                    return;
                };
                discarded += slot.rx.len();
                slot.rx.clear();
                if slot.sock_available == 0 || self.clock.elapsed_since(start) >= budget {
                    break;
                }
                let want = core::cmp::min(slot.rx.free(), slot.sock_available);
                match self.driver.pull_into_queue(mux, slot, want) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
                self.clock.yield_now();
            }
        } else {
            loop {
                let Some(slot) = self.channels.get_mut(mux) else {
                    return;
                };
                discarded += slot.rx.len();
                slot.rx.clear();
                self.maintain();
                let settled = self.channels.get(mux).is_none_or(|slot| slot.rx.is_empty());
                if settled || self.clock.elapsed_since(start) >= budget {
                    break;
                }
                self.clock.yield_now();
            }
        }

        self.driver.clear_input();
        if let Err(e) = self.driver.close_channel(mux) {
            log::warn!("Channel {}: close failed: {}", mux, e);
        }
        if let Some(slot) = self.channels.get_mut(mux) {
            discarded += slot.rx.len();
            slot.reset();
        }
        log::debug!("Channel {}: closed, {} unread bytes discarded", mux, discarded);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimModem};

    fn modem(policy: AvailabilityPolicy) -> (Modem, SimModem, SimClock) {
        let sim = SimModem::new(policy, 4);
        let clock = SimClock::new();
        let modem = Modem::new(
            Box::new(sim.clone()),
            Box::new(clock.clone()),
            Config::default(),
        );
        (modem, sim, clock)
    }

    #[test]
    fn test_maintain_queries_only_flagged_slots() {
        let (mut modem, sim, _) = modem(AvailabilityPolicy::ReadAndCheckSize);
        modem.claim(0).unwrap();
        modem.claim(1).unwrap();
        modem.channels_mut().get_mut(1).unwrap().got_data = true;

        modem.maintain();

        assert_eq!(sim.calls().query_available, 1);
        assert!(!modem.channels().get(1).unwrap().got_data);
        assert!(sim.calls().service >= 1);
    }

    #[test]
    fn test_maintain_without_size_queries() {
        for policy in [AvailabilityPolicy::NoModemBuffer, AvailabilityPolicy::ReadNoCheck] {
            let (mut modem, sim, _) = modem(policy);
            modem.claim(0).unwrap();
            modem.channels_mut().get_mut(0).unwrap().got_data = true;

            modem.maintain();

            assert_eq!(sim.calls().query_available, 0);
            assert_eq!(sim.calls().service, 1);
        }
    }

    #[test]
    fn test_check_size_picks_up_notification_on_next_pass() {
        let (mut modem, sim, _) = modem(AvailabilityPolicy::ReadAndCheckSize);
        modem.claim(2).unwrap();
        modem.open(2, SocketKind::Stream, "10.0.0.1", 80, 1_000).unwrap();
        sim.inject(2, b"payload");

        // First pass only sees the notification.
        modem.maintain();
        assert_eq!(modem.channels().get(2).unwrap().sock_available, 0);

        modem.maintain();
        assert_eq!(modem.channels().get(2).unwrap().sock_available, 7);
    }

    #[test]
    fn test_read_from_queue_skips_maintenance() {
        for policy in [AvailabilityPolicy::ReadNoCheck, AvailabilityPolicy::ReadAndCheckSize] {
            let (mut modem, sim, _) = modem(policy);
            modem.claim(0).unwrap();
            modem.open(0, SocketKind::Stream, "host", 1, 1_000).unwrap();
            modem.channels_mut().push_received(0, &[5u8; 20]);

            let mut buf = [0u8; 12];
            assert_eq!(modem.read(0, &mut buf, 100), 12);

            assert_eq!(sim.calls().service, 0, "policy {:?}", policy);
            assert_eq!(sim.calls().pull, 0);
            assert_eq!(modem.channels().get(0).unwrap().rx.len(), 8);
        }
    }

    #[test]
    fn test_open_moves_claim_to_assigned_channel() {
        let (mut modem, sim, _) = modem(AvailabilityPolicy::NoModemBuffer);
        modem.claim(0).unwrap();
        sim.assign_channel(Some(3));

        let assigned = modem.open(0, SocketKind::Stream, "host", 1, 1_000).unwrap();

        assert_eq!(assigned, 3);
        assert!(modem.channels().get(3).unwrap().is_claimed());
        assert!(!modem.channels().get(0).unwrap().is_claimed());
        assert!(modem.is_link_up(3));
    }

    #[test]
    fn test_close_drains_module_buffer() {
        let (mut modem, sim, _) = modem(AvailabilityPolicy::ReadNoCheck);
        modem.claim(0).unwrap();
        modem.open(0, SocketKind::Stream, "host", 1, 1_000).unwrap();
        sim.inject(0, &[7u8; 150]);
        modem.maintain();

        modem.close(0, 1_000);

        assert_eq!(sim.pending(0), 0);
        assert_eq!(sim.calls().clear_input, 1);
        assert_eq!(sim.calls().close, 1);
        assert!(!modem.is_link_up(0));
        assert!(!modem.is_held(0));
    }
}
