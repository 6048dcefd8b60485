//! Connectionless socket (UDP).
//!
//! Writes between `begin_packet` and `end_packet` are collected and leave
//! as one datagram. Receiving uses the same policy-driven path as the
//! stream socket; datagram boundaries are not preserved on receive.

use alloc::string::String;
use alloc::vec::Vec;
use core::net::Ipv4Addr;

use super::{render_ip, SocketCore};
use crate::error::{Error, Result};
use crate::modem::SharedModem;

/// Datagram socket bound to one modem channel.
///
/// # Example
///
/// ```rust,ignore
/// let mut udp = DatagramSocket::new(&modem, 1)?;
/// udp.begin(5000)?;
///
/// udp.begin_packet_ip([192, 168, 1, 10], 5000);
/// udp.write(b"temp=");
/// udp.write(b"21.5");
/// let sent = udp.end_packet()?;
/// ```
#[derive(Debug)]
pub struct DatagramSocket {
    core: SocketCore,

    /// Destination host of the packet being assembled (or last sent).
    destination: String,

    /// Destination port of the packet being assembled (or last sent).
    remote_port: u16,

    /// True between `begin_packet` and `end_packet`.
    buffering: bool,

    /// Pending writes, in call order.
    fragments: Vec<Vec<u8>>,
}

impl DatagramSocket {
    /// Claims channel `mux` on `modem`.
    pub fn new(modem: &SharedModem, mux: u8) -> Result<Self> {
        Ok(Self {
            core: SocketCore::attach(modem, mux)?,
            destination: String::new(),
            remote_port: 0,
            buffering: false,
            fragments: Vec::new(),
        })
    }

    /// Channel this socket is bound to.
    pub fn channel(&self) -> u8 {
        self.core.mux()
    }

    /// Opens a local binding on `port`.
    ///
    /// A channel the module still holds is stopped first.
    pub fn begin(&mut self, port: u16) -> Result<()> {
        if self.core.is_held() {
            self.stop();
        }
        self.core.bind(port)
    }

    /// Multicast membership is not offered by modem channels.
    pub fn begin_multicast(&mut self, _group: impl Into<Ipv4Addr>, _port: u16) -> Result<()> {
        Err(Error::Unsupported)
    }

    /// Starts assembling a datagram for `host:port`.
    ///
    /// Any unfinished packet is discarded.
    pub fn begin_packet(&mut self, host: &str, port: u16) {
        if !self.fragments.is_empty() {
            log::debug!(
                "Channel {}: discarding unfinished packet of {} bytes",
                self.core.mux(),
                self.pending_len()
            );
        }
        self.fragments.clear();
        self.destination.clear();
        self.destination.push_str(host);
        self.remote_port = port;
        self.buffering = true;
    }

    /// Starts assembling a datagram for an IPv4 address.
    pub fn begin_packet_ip(&mut self, ip: impl Into<Ipv4Addr>, port: u16) {
        let host = render_ip(ip);
        self.begin_packet(host.as_str(), port);
    }

    /// Appends a copy of `data` to the packet being assembled.
    ///
    /// Returns `data.len()`, or 0 outside `begin_packet`/`end_packet`.
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.buffering {
            log::warn!("Channel {}: write outside of a packet ignored", self.core.mux());
            return 0;
        }
        if !data.is_empty() {
            self.fragments.push(data.to_vec());
        }
        data.len()
    }

    /// Appends one byte to the packet being assembled.
    pub fn write_byte(&mut self, byte: u8) -> usize {
        self.write(&[byte])
    }

    /// Sends the assembled datagram.
    ///
    /// Returns the bytes the module sent. A packet with no writes goes out
    /// as a zero-length datagram. Without a preceding `begin_packet` this
    /// does nothing and returns `Ok(0)`.
    pub fn end_packet(&mut self) -> Result<usize> {
        if !self.buffering {
            return Ok(0);
        }

        let payload = self.fragments.concat();
        self.fragments.clear();
        self.buffering = false;

        log::debug!(
            "Channel {}: sending {} byte datagram to {}:{}",
            self.core.mux(),
            payload.len(),
            self.destination,
            self.remote_port
        );
        self.core.send_to(&payload, &self.destination, self.remote_port)
    }

    /// True between `begin_packet` and `end_packet`.
    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    /// Bytes assembled so far.
    pub fn pending_len(&self) -> usize {
        self.fragments.iter().map(Vec::len).sum()
    }

    /// Bytes ready to read; boundaries are not preserved.
    pub fn parse_packet(&mut self) -> usize {
        self.available()
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

    /// True while the binding is open or unread data remains.
    pub fn connected(&mut self) -> bool {
        self.core.connected()
    }

    /// Destination of the current or most recent outgoing packet.
    ///
    /// `None` if the destination was not a dotted-quad address.
    pub fn remote_ip(&self) -> Option<Ipv4Addr> {
        self.destination.parse().ok()
    }

    /// Destination port of the current or most recent outgoing packet.
    pub fn remote_port(&self) -> u16 {
        self.remote_port
    }

    /// Drops any unfinished packet and closes the channel.
    pub fn stop(&mut self) {
        let max_wait_ms = self.core.stop_timeout_ms();
        self.stop_with_timeout(max_wait_ms);
    }

    /// Drops any unfinished packet and closes the channel within `max_wait_ms`.
    pub fn stop_with_timeout(&mut self, max_wait_ms: u32) {
        self.fragments.clear();
        self.buffering = false;
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimClock, SimModem};
    use crate::{AvailabilityPolicy, Config, Modem};
    use alloc::boxed::Box;

    fn bound_socket(policy: AvailabilityPolicy) -> (DatagramSocket, SimModem, SharedModem) {
        let sim = SimModem::new(policy, 4);
        let modem = Modem::new(
            Box::new(sim.clone()),
            Box::new(SimClock::new()),
            Config::default(),
        )
        .into_shared();
        let mut socket = DatagramSocket::new(&modem, 1).unwrap();
        socket.begin(5000).unwrap();
        (socket, sim, modem)
    }

    #[test]
    fn test_fragments_sent_as_one_datagram() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::NoModemBuffer);

        socket.begin_packet("10.0.0.2", 9000);
        assert_eq!(socket.write(b"hello"), 5);
        assert_eq!(socket.write_byte(b' '), 1);
        assert_eq!(socket.write(b"world"), 5);
        assert_eq!(socket.end_packet().unwrap(), 11);

        let sent = sim.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, b"hello world");
        assert_eq!(sent[0].destination, Some((String::from("10.0.0.2"), 9000)));
        assert!(!socket.is_buffering());
        assert_eq!(socket.pending_len(), 0);
    }

    #[test]
    fn test_end_packet_without_begin_is_noop() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::ReadNoCheck);

        assert_eq!(socket.end_packet(), Ok(0));
        assert_eq!(socket.write(b"stray"), 0);
        assert_eq!(socket.end_packet(), Ok(0));
        assert_eq!(sim.calls().send, 0);
    }

    #[test]
    fn test_begin_packet_restarts_assembly() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::ReadAndCheckSize);

        socket.begin_packet("first", 1);
        socket.write(b"stale");
        socket.begin_packet_ip([192, 168, 1, 10], 2);
        socket.write(b"fresh");
        socket.end_packet().unwrap();

        let sent = sim.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, b"fresh");
        assert_eq!(socket.remote_ip(), Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(socket.remote_port(), 2);
    }

    #[test]
    fn test_short_send_reported_and_packet_cleared() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::NoModemBuffer);
        sim.limit_send(Some(3));

        socket.begin_packet("host", 7);
        socket.write(b"abcdef");
        assert_eq!(socket.end_packet(), Ok(3));
        assert_eq!(socket.pending_len(), 0);
    }

    #[test]
    fn test_empty_packet_is_sent() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::NoModemBuffer);

        socket.begin_packet("10.0.0.1", 9);
        assert_eq!(socket.end_packet(), Ok(0));
        assert!(!socket.is_buffering());

        let sent = sim.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].data.is_empty());
        assert_eq!(sent[0].destination, Some((String::from("10.0.0.1"), 9)));
    }

    #[test]
    fn test_begin_again_closes_held_binding() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::ReadNoCheck);
        assert_eq!(sim.calls().close, 0);

        socket.begin(5001).unwrap();

        assert_eq!(sim.calls().close, 1);
        assert_eq!(sim.calls().bind, 2);
        assert_eq!(sim.target(1), Some((String::from(""), 5001)));
    }

    #[test]
    fn test_remote_ip_for_named_host() {
        let (mut socket, _, _modem) = bound_socket(AvailabilityPolicy::NoModemBuffer);
        socket.begin_packet("example.com", 53);
        assert_eq!(socket.remote_ip(), None);
        assert_eq!(socket.remote_port(), 53);
    }

    #[test]
    fn test_multicast_unsupported() {
        let (mut socket, _, _modem) = bound_socket(AvailabilityPolicy::NoModemBuffer);
        assert_eq!(
            socket.begin_multicast([239, 0, 0, 1], 5353),
            Err(Error::Unsupported)
        );
    }

    #[test]
    fn test_receive_uses_channel_queue() {
        let (mut socket, sim, _modem) = bound_socket(AvailabilityPolicy::ReadAndCheckSize);
        sim.inject(1, b"reply");

        // Notification first, size query on the following pass.
        assert_eq!(socket.parse_packet(), 0);
        assert_eq!(socket.parse_packet(), 5);

        let mut buf = [0u8; 16];
        assert_eq!(socket.read(&mut buf), 5);
        assert_eq!(&buf[..5], b"reply");
    }
}
