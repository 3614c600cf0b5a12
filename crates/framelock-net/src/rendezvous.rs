//! Rendezvous Client (C5): UDP handshake with the broker to learn the
//! peer's public address for hole-punched P2P binding.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use framelock_proto::rendezvous::{RendezvousErrorCode, RendezvousMessage};

const RESEND_INTERVAL: Duration = Duration::from_millis(500);
const OVERALL_TIMEOUT: Duration = Duration::from_secs(120);
const RECV_BUF_LEN: usize = 512;

#[derive(Debug, Error)]
pub enum RendezvousError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Proto(#[from] framelock_proto::ProtoError),
    #[error("broker rejected handshake: {0:?}")]
    Rejected(RendezvousErrorCode),
    #[error("rendezvous timed out after {0:?}")]
    TimedOut(Duration),
}

/// Run the HELLO/READY handshake over `socket`, the same socket that will
/// later carry peer traffic so the broker observes the correct NAT mapping.
///
/// Resends HELLO every 500 ms until a READY/ERROR reply arrives or the
/// 120 s overall timeout elapses.
pub async fn rendezvous_connect(
    socket: &UdpSocket,
    broker: SocketAddr,
    token: Vec<u8>,
    local_data_port: u16,
) -> Result<SocketAddr, RendezvousError> {
    let hello = RendezvousMessage::Hello {
        token,
        local_data_port,
    }
    .encode();

    let deadline = Instant::now() + OVERALL_TIMEOUT;
    let mut buf = [0u8; RECV_BUF_LEN];

    loop {
        if Instant::now() >= deadline {
            return Err(RendezvousError::TimedOut(OVERALL_TIMEOUT));
        }

        socket.send_to(&hello, broker).await?;
        debug!(%broker, "sent rendezvous HELLO");

        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = remaining.min(RESEND_INTERVAL);

        match time::timeout(wait, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => {
                if from != broker {
                    continue;
                }
                match RendezvousMessage::decode(&buf[..n]) {
                    Ok(RendezvousMessage::Ready {
                        peer_ip,
                        peer_port,
                    }) => {
                        let addr = SocketAddr::new(std::net::IpAddr::V4(peer_ip), peer_port);
                        debug!(%addr, "rendezvous handshake complete");
                        return Ok(addr);
                    }
                    Ok(RendezvousMessage::Error { code }) => {
                        warn!(?code, "broker rejected rendezvous handshake");
                        return Err(RendezvousError::Rejected(code));
                    }
                    Ok(RendezvousMessage::Hello { .. }) => {
                        // Not a reply we expect on this side; ignore and keep waiting.
                    }
                    Err(e) => {
                        warn!(error = %e, "malformed rendezvous reply, ignoring");
                    }
                }
            }
            Ok(Err(e)) => return Err(RendezvousError::Io(e)),
            Err(_elapsed) => {
                // Resend interval elapsed with no reply; loop and resend.
            }
        }
    }
}

/// Helper for the peer whose role is "connect directly" without rendezvous
/// (e.g. a pre-shared address for local testing).
pub fn loopback_peer(port: u16) -> SocketAddr {
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scenario_5_handshake_literal() {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();
        let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker_addr = broker.local_addr().unwrap();

        let broker_task = tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUF_LEN];
            let (n, from) = broker.recv_from(&mut buf).await.unwrap();
            let msg = RendezvousMessage::decode(&buf[..n]).unwrap();
            assert_eq!(
                msg,
                RendezvousMessage::Hello {
                    token: b"abcd".to_vec(),
                    local_data_port: 51234,
                }
            );
            let ready = RendezvousMessage::Ready {
                peer_ip: "192.168.1.5".parse().unwrap(),
                peer_port: 55555,
            };
            broker.send_to(&ready.encode(), from).await.unwrap();
        });

        let peer_addr = rendezvous_connect(&client, broker_addr, b"abcd".to_vec(), 51234)
            .await
            .unwrap();

        assert_eq!(peer_addr.to_string(), "192.168.1.5:55555");
        assert_eq!(client.local_addr().unwrap(), client_addr);
        broker_task.await.unwrap();
    }

    #[tokio::test]
    async fn broker_error_aborts_with_code() {
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let broker_addr = broker.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; RECV_BUF_LEN];
            let (_n, from) = broker.recv_from(&mut buf).await.unwrap();
            let err = RendezvousMessage::Error {
                code: RendezvousErrorCode::UnknownRoom,
            };
            broker.send_to(&err.encode(), from).await.unwrap();
        });

        let result = rendezvous_connect(&client, broker_addr, b"xyz".to_vec(), 1).await;
        assert!(matches!(
            result,
            Err(RendezvousError::Rejected(RendezvousErrorCode::UnknownRoom))
        ));
    }
}
