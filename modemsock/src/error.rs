//! Error types shared by the driver seam and the socket layer.

use core::fmt;

/// Failures reported by socket and driver operations.
///
/// Zero bytes ready is never an error; reads and availability checks
/// report it as `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Channel index is outside the modem's multiplexing width.
    InvalidChannel,
    /// Channel slot is already owned by another socket.
    ChannelInUse,
    /// The module refused or failed to open the channel.
    ConnectFailed,
    /// The channel is not open.
    NotConnected,
    /// The module failed to accept outgoing data.
    SendFailed,
    /// The module did not answer in time.
    Timeout,
    /// The module does not support the operation.
    Unsupported,
    /// Any other module fault.
    Driver,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidChannel => write!(f, "Channel index out of range"),
            Error::ChannelInUse => write!(f, "Channel already in use"),
            Error::ConnectFailed => write!(f, "Failed to open channel"),
            Error::NotConnected => write!(f, "Channel not connected"),
            Error::SendFailed => write!(f, "Module rejected outgoing data"),
            Error::Timeout => write!(f, "Module response timed out"),
            Error::Unsupported => write!(f, "Operation not supported by module"),
            Error::Driver => write!(f, "Module driver error"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(feature = "std")]
impl From<Error> for std::io::Error {
    fn from(err: Error) -> std::io::Error {
        let kind = match err {
            Error::NotConnected => std::io::ErrorKind::NotConnected,
            Error::ConnectFailed => std::io::ErrorKind::ConnectionRefused,
            Error::Timeout => std::io::ErrorKind::TimedOut,
            Error::SendFailed => std::io::ErrorKind::WriteZero,
            Error::Unsupported => std::io::ErrorKind::Unsupported,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, Error>;
