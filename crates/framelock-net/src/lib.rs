//! Networking layer: the UDP rendezvous client (C5) and the QUIC-based peer
//! session transport (C6). Asynchronous (tokio); `framelock-core` stays
//! synchronous and is driven from the far side of a channel by
//! `framelock-session`.

pub mod error;
pub mod peer_session;
pub mod quic_peer;
pub mod rendezvous;

pub use error::NetError;
pub use peer_session::{PeerSession, RecvOutcome};
pub use rendezvous::{rendezvous_connect, RendezvousError};
