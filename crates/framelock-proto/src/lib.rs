//! Wire formats for the rendezvous handshake and the peer session protocol.
//!
//! Two distinct wire layouts live here:
//! - [`rendezvous`]: the `NRLY`-prefixed UDP handshake spoken to the rendezvous broker.
//! - [`header`]/[`msg_id`]/[`messages`]/[`codec`]: the peer-to-peer application protocol,
//!   framed with a small fixed header and `postcard`-encoded payloads.
//!
//! [`input_word`] is shared by both the persistence format and the wire: it is the only
//! representation of a controller's digital+analog state that ever crosses a process
//! boundary or hits disk.

pub mod codec;
pub mod constants;
pub mod error;
pub mod header;
pub mod input_word;
pub mod messages;
pub mod msg_id;
pub mod rendezvous;

pub use error::ProtoError;
