//! Timing configuration for the maintenance engine and sockets.

/// Notification wait for modules without a sizeable buffer.
pub const DEFAULT_MAINTAIN_WAIT_MS: u32 = 100;

/// Notification wait per cycle for modules that report buffer size.
pub const DEFAULT_CHECK_SIZE_WAIT_MS: u32 = 15;

/// Minimum spacing between forced buffer-size queries.
pub const DEFAULT_POLL_INTERVAL_MS: u32 = 500;

/// Default channel open timeout.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u32 = 75_000;

/// Default bound on draining module-resident bytes during `stop`.
pub const DEFAULT_STOP_TIMEOUT_MS: u32 = 15_000;

/// Initial per-socket read timeout.
pub const DEFAULT_IO_TIMEOUT_MS: u32 = 1_000;

/// Modem timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Bounded wait for unsolicited notifications (policies A and B).
    pub maintain_wait_ms: u32,
    /// Bounded wait per notification cycle (policy C).
    pub check_size_wait_ms: u32,
    /// Throttle for forced size queries (policy C).
    pub poll_interval_ms: u32,
    /// Timeout passed to the driver by `connect`.
    pub connect_timeout_ms: u32,
    /// Bound on the drain performed by `stop`.
    pub stop_timeout_ms: u32,
    /// Read timeout given to newly created sockets.
    pub io_timeout_ms: u32,
}

impl Config {
    /// Creates a configuration with the default timings.
    pub fn new() -> Self {
        Self {
            maintain_wait_ms: DEFAULT_MAINTAIN_WAIT_MS,
            check_size_wait_ms: DEFAULT_CHECK_SIZE_WAIT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            stop_timeout_ms: DEFAULT_STOP_TIMEOUT_MS,
            io_timeout_ms: DEFAULT_IO_TIMEOUT_MS,
        }
    }

    /// Sets `maintain_wait_ms`.
    pub fn with_maintain_wait_ms(mut self, ms: u32) -> Self {
        self.maintain_wait_ms = ms;
        self
    }

    /// Sets `check_size_wait_ms`.
    pub fn with_check_size_wait_ms(mut self, ms: u32) -> Self {
        self.check_size_wait_ms = ms;
        self
    }

    /// Sets `poll_interval_ms`.
    pub fn with_poll_interval_ms(mut self, ms: u32) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Sets `connect_timeout_ms`.
    pub fn with_connect_timeout_ms(mut self, ms: u32) -> Self {
        self.connect_timeout_ms = ms;
        self
    }

    /// Sets `stop_timeout_ms`.
    pub fn with_stop_timeout_ms(mut self, ms: u32) -> Self {
        self.stop_timeout_ms = ms;
        self
    }

    /// Sets `io_timeout_ms`.
    pub fn with_io_timeout_ms(mut self, ms: u32) -> Self {
        self.io_timeout_ms = ms;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
