//! Driver seam between the socket core and a concrete module.
//!
//! This module provides the `ModemDriver` trait that the socket layer
//! consumes. A driver formats module commands, talks to the serial link,
//! and parses unsolicited notifications; none of that lives in this crate.
//!
//! # Implementations
//!
//! - `SimModem`: scriptable in-memory module (see [`crate::sim`])
//!
//! The `Clock` trait supplies time and the cooperative yield point used by
//! every bounded wait.

use crate::channel::{ChannelSlot, ChannelTable, SocketKind};
use crate::error::Result;
use crate::policy::AvailabilityPolicy;

/// Buffer occupancy and liveness reported by a size query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferStatus {
    /// Bytes held by the module for the channel.
    pub available: usize,
    /// Whether the module still considers the channel open.
    pub connected: bool,
}

/// Host-side command interface of a communications module.
///
/// Every method must return within its stated bound; none may call back
/// into a socket.
pub trait ModemDriver {
    /// The availability policy this module family implements.
    fn policy(&self) -> AvailabilityPolicy;

    /// Number of channels the module can multiplex.
    fn mux_count(&self) -> usize;

    /// Opens a connection on `mux` to `host:port`.
    ///
    /// Returns the channel id the module assigned, usually `mux`.
    fn open_channel(
        &mut self,
        mux: u8,
        kind: SocketKind,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<u8>;

    /// Opens a local datagram binding on `local_port`.
    ///
    /// Returns the channel id the module assigned, usually `mux`.
    fn bind(&mut self, mux: u8, local_port: u16) -> Result<u8>;

    /// Sends stream data. Returns the number of bytes the module accepted.
    fn send(&mut self, mux: u8, data: &[u8]) -> Result<usize>;

    /// Sends one datagram to `host:port`. Returns the bytes sent.
    fn send_to(&mut self, mux: u8, data: &[u8], host: &str, port: u16) -> Result<usize>;

    /// Moves up to `max` bytes from the module's buffer into `slot.rx`.
    ///
    /// Updates `slot.sock_available` with what remains in the module.
    /// Returns the number of bytes transferred; 0 means nothing more can
    /// be transferred right now.
    fn pull_into_queue(&mut self, mux: u8, slot: &mut ChannelSlot, max: usize) -> Result<usize>;

    /// Asks the module how many bytes it holds for `mux`.
    fn query_available(&mut self, mux: u8) -> Result<BufferStatus>;

    /// Asks the module whether `mux` is still open.
    fn query_connected(&mut self, mux: u8) -> bool;

    /// Processes pending notifications for up to `timeout_ms`.
    ///
    /// May push bytes into receive queues, raise `got_data`, and update
    /// `sock_available` or `sock_connected` on any slot.
    fn service_unsolicited(&mut self, channels: &mut ChannelTable, timeout_ms: u32);

    /// True if unprocessed input is waiting on the link.
    fn has_pending_input(&self) -> bool {
        false
    }

    /// Discards whatever is left in the link's input buffer.
    fn clear_input(&mut self) {}

    /// Flushes outgoing link data.
    fn flush(&mut self) {}

    /// Releases the channel on the module.
    fn close_channel(&mut self, mux: u8) -> Result<()>;
}

/// Millisecond time source with a cooperative yield point.
pub trait Clock {
    /// Monotonic milliseconds since an arbitrary origin.
    fn now_ms(&self) -> u64;

    /// Lets platform background work run inside a busy-wait.
    fn yield_now(&self) {}

    /// Milliseconds elapsed since `start`.
    fn elapsed_since(&self, start: u64) -> u64 {
        self.now_ms().wrapping_sub(start)
    }
}

/// Wall-clock time from `std::time::Instant`.
#[cfg(feature = "std")]
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    /// Creates a clock whose origin is now.
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }

    fn yield_now(&self) {
        std::thread::yield_now();
    }
}
