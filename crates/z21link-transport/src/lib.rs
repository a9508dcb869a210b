//! UDP datagram transport for Z21 command stations.
//!
//! This is the lowest layer of z21link. A Z21 station speaks a message-oriented
//! protocol on UDP port 21105; [`UdpTransport`] owns one connected socket and
//! moves whole datagrams in and out of it. Everything else builds on top of it.

pub mod error;
pub mod udp;

pub use error::{Result, TransportError};
pub use udp::{UdpTransport, DEFAULT_PORT, MAX_DATAGRAM_SIZE};
