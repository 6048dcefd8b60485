//! Connection-oriented socket (TCP).
//!
//! Writes go straight to the module; nothing is buffered host-side.
//! Reads drain the channel's receive queue and, for modules that hold
//! data, pull more on demand.

use core::net::Ipv4Addr;

use super::{render_ip, SocketCore};
use crate::channel::SocketKind;
use crate::error::Result;
use crate::modem::SharedModem;

/// Byte-stream socket bound to one modem channel.
///
/// # Example
///
/// ```rust,ignore
/// let mut client = StreamSocket::new(&modem, 0)?;
/// client.connect_ip([93, 184, 216, 34], 80)?;
/// client.write_str("HEAD / HTTP/1.0\r\n\r\n")?;
///
/// let mut buf = [0u8; 64];
/// while client.connected() {
///     let n = client.read(&mut buf);
///     handle(&buf[..n]);
/// }
/// client.stop();
/// ```
#[derive(Debug)]
pub struct StreamSocket {
    core: SocketCore,
}

impl StreamSocket {
    /// Claims channel `mux` on `modem`.
    ///
    /// Fails with `ChannelInUse` if another socket owns the slot.
    pub fn new(modem: &SharedModem, mux: u8) -> Result<Self> {
        Ok(Self {
            core: SocketCore::attach(modem, mux)?,
        })
    }

    /// Channel this socket is bound to.
    pub fn channel(&self) -> u8 {
        self.core.mux()
    }

    /// Connects to `host:port` with the configured connect timeout.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let timeout_ms = self.core.connect_timeout_ms();
        self.connect_with_timeout(host, port, timeout_ms)
    }

    /// Connects to `host:port`, giving the module `timeout_ms` to answer.
    ///
    /// A channel the module still holds is stopped first.
    pub fn connect_with_timeout(&mut self, host: &str, port: u16, timeout_ms: u32) -> Result<()> {
        if self.core.is_held() {
            self.stop();
        }
        self.core.open(SocketKind::Stream, host, port, timeout_ms)
    }

    /// Connects to an IPv4 address with the configured connect timeout.
    pub fn connect_ip(&mut self, ip: impl Into<Ipv4Addr>, port: u16) -> Result<()> {
        let timeout_ms = self.core.connect_timeout_ms();
        self.connect_ip_with_timeout(ip, port, timeout_ms)
    }

    /// Connects to an IPv4 address, giving the module `timeout_ms` to answer.
    pub fn connect_ip_with_timeout(
        &mut self,
        ip: impl Into<Ipv4Addr>,
        port: u16,
        timeout_ms: u32,
    ) -> Result<()> {
        let host = render_ip(ip);
        self.connect_with_timeout(host.as_str(), port, timeout_ms)
    }

    /// Hands `data` to the module after one maintenance pass.
    ///
    /// Returns the number of bytes the module accepted.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.core.send(data)
    }

    /// Writes a single byte.
    pub fn write_byte(&mut self, byte: u8) -> Result<usize> {
        self.write(&[byte])
    }

    /// Writes the UTF-8 bytes of `text`.
    pub fn write_str(&mut self, text: &str) -> Result<usize> {
        self.write(text.as_bytes())
    }

    /// Bytes ready to read.
    pub fn available(&mut self) -> usize {
        self.core.available()
    }

    /// Reads up to `buf.len()` bytes. Returns the count copied.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        self.core.read(buf)
    }

    /// Reads one byte, if any arrives within the socket timeout.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.core.read_byte()
    }

    /// Next byte without consuming it.
    pub fn peek(&mut self) -> Option<u8> {
        self.core.peek()
    }

    /// Flushes the module link.
    pub fn flush(&mut self) {
        self.core.flush();
    }

    /// True while the peer is connected or unread data remains.
    pub fn connected(&mut self) -> bool {
        self.core.connected()
    }

    /// Same as [`connected`](Self::connected).
    pub fn is_open(&mut self) -> bool {
        self.connected()
    }

    /// Drains and closes the channel with the configured bound.
    pub fn stop(&mut self) {
        let max_wait_ms = self.core.stop_timeout_ms();
        self.stop_with_timeout(max_wait_ms);
    }

    /// Drains and closes the channel, waiting at most `max_wait_ms`.
    pub fn stop_with_timeout(&mut self, max_wait_ms: u32) {
        self.core.close(max_wait_ms);
    }

    /// Sets the read timeout.
    pub fn set_timeout(&mut self, ms: u32) {
        self.core.set_timeout_ms(ms);
    }

    /// Current read timeout.
    pub fn timeout(&self) -> u32 {
        self.core.timeout_ms()
    }
}

#[cfg(feature = "std")]
impl std::io::Read for StreamSocket {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match StreamSocket::read(self, buf) {
            0 if self.connected() => Err(std::io::ErrorKind::WouldBlock.into()),
            n => Ok(n),
        }
    }
}

#[cfg(feature = "std")]
impl std::io::Write for StreamSocket {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Ok(StreamSocket::write(self, buf)?)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        StreamSocket::flush(self);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimModem};
    use crate::{AvailabilityPolicy, Config, Error, Modem};
    use alloc::boxed::Box;
    use alloc::string::String;

    fn setup(policy: AvailabilityPolicy) -> (SharedModem, SimModem, SimClock) {
        let sim = SimModem::new(policy, 4);
        let clock = SimClock::new();
        let modem = Modem::new(
            Box::new(sim.clone()),
            Box::new(clock.clone()),
            Config::default().with_io_timeout_ms(50),
        )
        .into_shared();
        (modem, sim, clock)
    }

    #[test]
    fn test_slot_is_exclusive_until_dropped() {
        let (modem, _, _) = setup(AvailabilityPolicy::NoModemBuffer);

        let first = StreamSocket::new(&modem, 1).unwrap();
        assert_eq!(StreamSocket::new(&modem, 1).unwrap_err(), Error::ChannelInUse);

        drop(first);
        assert!(StreamSocket::new(&modem, 1).is_ok());
    }

    #[test]
    fn test_drop_while_modem_borrowed_keeps_claim() {
        let (modem, _, _) = setup(AvailabilityPolicy::NoModemBuffer);
        let socket = StreamSocket::new(&modem, 2).unwrap();

        let guard = modem.borrow();
        drop(socket);
        drop(guard);

        assert!(modem.borrow().channels().get(2).unwrap().is_claimed());
    }

    #[test]
    fn test_connect_ip_renders_dotted_quad() {
        let (modem, sim, _) = setup(AvailabilityPolicy::ReadNoCheck);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();

        socket.connect_ip([192, 168, 1, 10], 8080).unwrap();

        assert_eq!(sim.target(0), Some((String::from("192.168.1.10"), 8080)));
        assert_eq!(sim.calls().close, 0);
    }

    #[test]
    fn test_connect_failure_is_reported() {
        let (modem, sim, _) = setup(AvailabilityPolicy::NoModemBuffer);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        sim.refuse_connections(true);

        assert_eq!(socket.connect("example.com", 80), Err(Error::ConnectFailed));
        assert!(!socket.connected());
    }

    #[test]
    fn test_write_is_immediate() {
        let (modem, sim, _) = setup(AvailabilityPolicy::NoModemBuffer);
        let mut socket = StreamSocket::new(&modem, 2).unwrap();
        socket.connect("example.com", 80).unwrap();

        assert_eq!(socket.write(b"abc").unwrap(), 3);
        assert_eq!(socket.write_byte(b'd').unwrap(), 1);

        let sent = sim.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].data, b"abc");
        assert_eq!(sent[1].data, b"d");
        assert_eq!(sim.calls().service, 2);
    }

    #[test]
    fn test_short_send_is_reported() {
        let (modem, sim, _) = setup(AvailabilityPolicy::ReadAndCheckSize);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        socket.connect("example.com", 80).unwrap();
        sim.limit_send(Some(4));

        assert_eq!(socket.write(b"abcdefgh").unwrap(), 4);
    }

    #[test]
    fn test_reconnect_stops_previous_connection() {
        let (modem, sim, _) = setup(AvailabilityPolicy::ReadAndCheckSize);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        socket.connect("first", 1).unwrap();
        socket.connect("second", 2).unwrap();

        assert_eq!(sim.calls().close, 1);
        assert_eq!(sim.calls().open, 2);
        assert_eq!(sim.target(0), Some((String::from("second"), 2)));
    }

    #[test]
    fn test_reconnect_after_peer_close_releases_module_channel() {
        let (modem, sim, _) = setup(AvailabilityPolicy::ReadAndCheckSize);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        socket.connect("first", 1).unwrap();
        sim.inject(0, b"bye");
        sim.peer_close(0);

        let mut buf = [0u8; 8];
        while socket.connected() {
            socket.read(&mut buf);
        }
        assert_eq!(sim.calls().close, 0);
        assert!(sim.is_open(0));

        socket.connect("second", 2).unwrap();

        assert_eq!(sim.calls().close, 1);
        assert_eq!(sim.calls().clear_input, 1);
        assert_eq!(sim.target(0), Some((String::from("second"), 2)));
        assert!(socket.connected());
    }

    #[test]
    fn test_read_byte_and_peek() {
        let (modem, sim, _) = setup(AvailabilityPolicy::ReadNoCheck);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        socket.connect("host", 7).unwrap();
        sim.inject(0, b"xy");

        assert_eq!(socket.peek(), Some(b'x'));
        assert_eq!(socket.read_byte(), Some(b'x'));
        assert_eq!(socket.read_byte(), Some(b'y'));
        assert_eq!(socket.read_byte(), None);
    }

    #[test]
    fn test_stop_closes_channel() {
        let (modem, sim, _) = setup(AvailabilityPolicy::NoModemBuffer);
        let mut socket = StreamSocket::new(&modem, 0).unwrap();
        socket.connect("host", 7).unwrap();
        sim.inject(0, b"unread");

        socket.stop_with_timeout(100);

        assert!(!sim.is_open(0));
        assert_eq!(sim.calls().clear_input, 1);
        assert_eq!(modem.borrow().channels().get(0).unwrap().rx.len(), 0);
    }
}
