use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Default Z21 LAN port.
pub const DEFAULT_PORT: u16 = 21105;

/// Largest datagram a station is expected to send.
///
/// A single datagram may batch several envelopes; 1 KiB leaves ample headroom.
pub const MAX_DATAGRAM_SIZE: usize = 1024;

/// A UDP socket connected to one Z21 station.
///
/// The socket is bound to an ephemeral local port and associated with the
/// station address, so `send`/`recv` only exchange datagrams with that peer.
/// All methods take `&self`; share the transport behind an `Arc` to send from
/// many tasks while a single task reads.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    local_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl UdpTransport {
    /// Resolve `host` and connect to it on `port`.
    ///
    /// The first resolved address wins. IPv4 and IPv6 hosts bind a wildcard
    /// socket of the matching family.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|source| TransportError::Resolve {
                host: host.to_string(),
                source,
            })?;
        let addr = addrs.next().ok_or_else(|| TransportError::NoAddress {
            host: host.to_string(),
        })?;
        Self::connect_addr(addr).await
    }

    /// Connect to an already resolved station address.
    pub async fn connect_addr(addr: SocketAddr) -> Result<Self> {
        let bind_addr = match addr {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(bind_addr)
            .await
            .map_err(|source| TransportError::Bind {
                addr: bind_addr,
                source,
            })?;
        socket
            .connect(addr)
            .await
            .map_err(|source| TransportError::Connect { addr, source })?;

        let local_addr = socket.local_addr()?;
        debug!(local = %local_addr, remote = %addr, "udp transport connected");

        Ok(Self {
            socket,
            local_addr,
            peer_addr: addr,
        })
    }

    /// Local address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Station address the socket is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Send one datagram to the station.
    pub async fn send(&self, datagram: &[u8]) -> Result<()> {
        let sent = self.socket.send(datagram).await?;
        if sent != datagram.len() {
            return Err(TransportError::ShortSend {
                sent,
                len: datagram.len(),
            });
        }
        trace!(remote = %self.peer_addr, bytes = sent, "datagram sent");
        Ok(())
    }

    /// Receive one datagram into `buf`, returning its length.
    ///
    /// Bytes beyond `buf.len()` are discarded by the kernel.
    pub async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.socket.recv(buf).await?;
        trace!(remote = %self.peer_addr, bytes = n, "datagram received");
        Ok(n)
    }
}
