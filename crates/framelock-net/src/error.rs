use thiserror::Error;

use framelock_proto::ProtoError;

#[derive(Debug, Error)]
pub enum NetError {
    #[error("protocol error: {0}")]
    Proto(#[from] ProtoError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("quic connection error: {0}")]
    Connect(#[from] quinn::ConnectError),
    #[error("quic connection lost: {0}")]
    Connection(#[from] quinn::ConnectionError),
    #[error("quic write error: {0}")]
    Write(#[from] quinn::WriteError),
    #[error("quic read error: {0}")]
    Read(#[from] quinn::ReadError),
    #[error("quic datagram send error: {0}")]
    SendDatagram(#[from] quinn::SendDatagramError),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("setup call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("peer disconnected")]
    Disconnected,
    #[error("tls config error: {0}")]
    Tls(String),
}
