use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Largest datagram [`recv_from`](UdpTransport::recv_from) will accept.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// UDP socket carrying RTP packets.
///
/// Address-only: it knows nothing about streams or SSRCs. Clones share
/// the same socket, so one task can send while another receives.
#[derive(Debug, Clone)]
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
}

impl UdpTransport {
    /// Bind to `addr`. Use port 0 for an ephemeral sending socket.
    pub fn bind(addr: impl ToSocketAddrs) -> Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        tracing::debug!(local_addr = ?socket.local_addr().ok(), "UDP socket bound");
        Ok(Self {
            socket: Arc::new(socket),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking reads give up after `timeout`; `None` waits forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        Ok(self.socket.set_read_timeout(timeout)?)
    }

    /// Send one packet to `addr`.
    pub fn send_to(&self, payload: &[u8], addr: SocketAddr) -> Result<usize> {
        let sent = self.socket.send_to(payload, addr)?;
        tracing::trace!(%addr, size = sent, "datagram sent");
        Ok(sent)
    }

    /// Receive one packet into `buf`.
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        let (len, addr) = self.socket.recv_from(buf)?;
        tracing::trace!(%addr, size = len, "datagram received");
        Ok((len, addr))
    }
}
