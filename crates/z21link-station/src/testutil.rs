//! Loopback stand-in for a Z21 station.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use z21link_frame::{decode_envelope, Envelope, LAN_SET_BROADCASTFLAGS};

use crate::config::StationConfig;
use crate::station::Station;

pub(crate) struct FakeStation {
    socket: UdpSocket,
    client: Option<SocketAddr>,
}

impl FakeStation {
    pub(crate) async fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0")
            .await
            .expect("fake station should bind");
        Self {
            socket,
            client: None,
        }
    }

    pub(crate) fn socket(&self) -> &UdpSocket {
        &self.socket
    }

    pub(crate) fn config(&self) -> StationConfig {
        let port = self.socket.local_addr().expect("local addr").port();
        StationConfig::default()
            .with_port(port)
            .with_timeout(Duration::from_millis(300))
    }

    pub(crate) async fn recv(&mut self) -> Envelope {
        let mut buf = [0u8; 1024];
        let (n, from) = tokio::time::timeout(
            Duration::from_secs(2),
            self.socket.recv_from(&mut buf),
        )
        .await
        .expect("client should send within 2s")
        .expect("recv should succeed");
        self.client = Some(from);
        decode_envelope(&buf[..n]).expect("client sends valid envelopes").0
    }

    pub(crate) async fn recv_kind(&mut self, kind: u16) -> Envelope {
        loop {
            let envelope = self.recv().await;
            if envelope.kind == kind {
                return envelope;
            }
        }
    }

    pub(crate) async fn reply(&self, datagram: &[u8]) {
        let client = self.client.expect("client address is known");
        self.socket
            .send_to(datagram, client)
            .await
            .expect("send should succeed");
    }

    pub(crate) async fn reply_envelope(&self, envelope: Envelope) {
        self.reply(&envelope.to_bytes().expect("envelope encodes"))
            .await;
    }
}

pub(crate) async fn connected() -> (FakeStation, Station) {
    let mut fake = FakeStation::bind().await;
    let station = Station::connect("127.0.0.1", fake.config())
        .await
        .expect("connect should succeed");
    let hello = fake.recv().await;
    assert_eq!(hello.kind, LAN_SET_BROADCASTFLAGS);
    assert_eq!(hello.payload.as_ref(), &[0x01, 0x00, 0x00, 0x00]);
    (fake, station)
}
