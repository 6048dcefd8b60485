//! Data-availability policies.
//!
//! Module families differ in how much they buffer on their side of the link
//! and whether the host can ask how much is buffered. Each driver declares
//! exactly one policy; the [`Modem`](crate::Modem) resolves it once at
//! construction and never switches at runtime.

/// How "bytes ready" is computed and how maintenance behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityPolicy {
    /// The module pushes every inbound byte into the receive queue.
    ///
    /// `available()` is the queue length alone.
    NoModemBuffer,

    /// The module holds extra bytes the host cannot size.
    ///
    /// `available()` adds the last (approximate) module count to the queue
    /// length, and bytes are pulled from the module on read.
    ReadNoCheck,

    /// The module reports exact buffer occupancy and connection state on
    /// demand.
    ///
    /// Maintenance proactively queries every channel flagged with new data.
    ReadAndCheckSize,
}

impl AvailabilityPolicy {
    /// True if the module keeps bytes that must be pulled explicitly.
    #[inline]
    pub const fn has_module_buffer(self) -> bool {
        !matches!(self, AvailabilityPolicy::NoModemBuffer)
    }

    /// True if the module can be asked how many bytes it holds.
    #[inline]
    pub const fn can_query_size(self) -> bool {
        matches!(self, AvailabilityPolicy::ReadAndCheckSize)
    }

    /// True if the last reconciled connection flag can be trusted without
    /// a fresh liveness query.
    #[inline]
    pub const fn trusts_reconciled_state(self) -> bool {
        self.can_query_size()
    }
}
