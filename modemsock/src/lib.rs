//! # ModemSock - Sockets over a Modem Command Channel
//!
//! ModemSock is a `no_std` socket layer that emulates TCP and UDP sockets on
//! top of a single serial command-and-data link to a cellular or radio
//! module. Many logical connections ("channels") are multiplexed over that
//! one link.
//!
//! - **Channel slots**: per-connection state with a bounded receive queue
//! - **Availability policies**: three module families with different
//!   buffering models, selected once per driver
//! - **Maintenance engine**: bounded reconciliation of local state with the
//!   module before every read or availability check
//! - **Stream sockets**: connect/write/read/available/connected/stop
//! - **Datagram sockets**: packet assembly between `begin_packet` and
//!   `end_packet`, policy-driven receive
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Socket Layer                          │
//! │  ┌─────────────────────┐   ┌─────────────────────────┐  │
//! │  │    StreamSocket     │   │     DatagramSocket      │  │
//! │  └─────────────────────┘   └─────────────────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Modem Hub                             │
//! │  ┌─────────────┐ ┌─────────────┐ ┌─────────────────┐   │
//! │  │ Maintenance │ │   Policy    │ │  Channel Table  │   │
//! │  └─────────────┘ └─────────────┘ └─────────────────┘   │
//! ├─────────────────────────────────────────────────────────┤
//! │                    Driver Layer                          │
//! │  ┌─────────────────────────────────────────────────┐   │
//! │  │          ModemDriver (AT command transport)      │   │
//! │  └─────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use modemsock::{Config, Modem, StreamSocket};
//!
//! let modem = Modem::new(Box::new(driver), Box::new(clock), Config::default()).into_shared();
//! let mut client = StreamSocket::new(&modem, 0)?;
//!
//! client.connect("example.com", 80)?;
//! client.write(b"GET / HTTP/1.0\r\n\r\n")?;
//!
//! let mut buf = [0u8; 128];
//! while client.connected() {
//!     let n = client.read(&mut buf);
//!     // ...
//! }
//! client.stop();
//! ```

#![no_std]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

pub mod buffer;
pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod modem;
pub mod policy;
pub mod sim;
pub mod socket;

// Re-export commonly used types
pub use channel::{ChannelSlot, ChannelTable, SocketKind};
pub use config::Config;
pub use driver::{BufferStatus, Clock, ModemDriver};
pub use error::{Error, Result};
pub use modem::{Modem, SharedModem};
pub use policy::AvailabilityPolicy;
pub use socket::{render_ip, DatagramSocket, StreamSocket};

#[cfg(feature = "std")]
pub use driver::StdClock;

/// Capacity of each channel's receive queue in bytes.
pub const RX_BUFFER_SIZE: usize = 64;

/// Upper bound on the multiplexing width of a single modem.
pub const MAX_CHANNELS: usize = 8;
