//! Buffer management for channel receive paths.
//!
//! - RingBuffer: fixed-capacity byte FIFO
//! - ReceiveQueue: the per-channel queue the transport fills

mod ring;

pub use ring::RingBuffer;

/// Per-channel receive queue.
pub type ReceiveQueue = RingBuffer<{ crate::RX_BUFFER_SIZE }>;
