//! Stream and datagram sockets over modem channels.
//!
//! Both socket kinds own one channel slot and share the receive path; they
//! differ only in how outgoing data reaches the module.

mod datagram;
mod stream;

pub use datagram::DatagramSocket;
pub use stream::StreamSocket;

use alloc::rc::Rc;
use core::fmt::Write as _;
use core::net::Ipv4Addr;

use crate::channel::SocketKind;
use crate::error::Result;
use crate::modem::SharedModem;

/// Longest dotted-quad text: `255.255.255.255`.
pub const MAX_IP_TEXT: usize = 15;

/// Renders an IPv4 address as dotted-quad text.
///
/// This is the only place addresses are turned into host strings for the
/// driver.
pub fn render_ip(addr: impl Into<Ipv4Addr>) -> heapless::String<MAX_IP_TEXT> {
    let [a, b, c, d] = addr.into().octets();
    let mut text = heapless::String::new();
    // Cannot overflow: four octets and three dots fit in 15 bytes.
    let _ = write!(text, "{}.{}.{}.{}", a, b, c, d);
    text
}

/// Channel ownership and receive path shared by both socket kinds.
#[derive(Debug)]
pub(crate) struct SocketCore {
    modem: SharedModem,
    mux: u8,
    timeout_ms: u32,
}

impl SocketCore {
    pub(crate) fn attach(modem: &SharedModem, mux: u8) -> Result<Self> {
        let timeout_ms = {
            let mut inner = modem.borrow_mut();
            inner.claim(mux)?;
            inner.config().io_timeout_ms
        };

        Ok(Self {
            modem: Rc::clone(modem),
            mux,
            timeout_ms,
        })
    }

    pub(crate) fn mux(&self) -> u8 {
        self.mux
    }

    pub(crate) fn timeout_ms(&self) -> u32 {
        self.timeout_ms
    }

    pub(crate) fn set_timeout_ms(&mut self, ms: u32) {
        self.timeout_ms = ms;
    }

    pub(crate) fn connect_timeout_ms(&self) -> u32 {
        self.modem.borrow().config().connect_timeout_ms
    }

    pub(crate) fn stop_timeout_ms(&self) -> u32 {
        self.modem.borrow().config().stop_timeout_ms
    }

    pub(crate) fn is_held(&self) -> bool {
        self.modem.borrow().is_held(self.mux)
    }

    pub(crate) fn open(
        &mut self,
        kind: SocketKind,
        host: &str,
        port: u16,
        timeout_ms: u32,
    ) -> Result<()> {
        let assigned = self
            .modem
            .borrow_mut()
            .open(self.mux, kind, host, port, timeout_ms)?;
        self.mux = assigned;
        Ok(())
    }

    pub(crate) fn bind(&mut self, local_port: u16) -> Result<()> {
        let assigned = self.modem.borrow_mut().bind(self.mux, local_port)?;
        self.mux = assigned;
        Ok(())
    }

    pub(crate) fn send(&self, data: &[u8]) -> Result<usize> {
        self.modem.borrow_mut().send(self.mux, data)
    }

    pub(crate) fn send_to(&self, data: &[u8], host: &str, port: u16) -> Result<usize> {
        self.modem.borrow_mut().send_to(self.mux, data, host, port)
    }

    pub(crate) fn available(&self) -> usize {
        self.modem.borrow_mut().available(self.mux)
    }

    pub(crate) fn read(&self, buf: &mut [u8]) -> usize {
        self.modem.borrow_mut().read(self.mux, buf, self.timeout_ms)
    }

    pub(crate) fn read_byte(&self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.modem.borrow_mut().peek(self.mux)
    }

    pub(crate) fn flush(&self) {
        self.modem.borrow_mut().flush();
    }

    pub(crate) fn connected(&self) -> bool {
        self.modem.borrow_mut().connected(self.mux)
    }

    pub(crate) fn close(&self, max_wait_ms: u32) {
        self.modem.borrow_mut().close(self.mux, max_wait_ms);
    }
}

impl Drop for SocketCore {
    fn drop(&mut self) {
        match self.modem.try_borrow_mut() {
            Ok(mut modem) => modem.release(self.mux),
            Err(_) => log::warn!("Channel {}: modem busy on drop, slot left claimed", self.mux),
        }
    }
}
