//! Protocol constants for framelock-proto.

/// Magic bytes at the beginning of every rendezvous datagram.
pub const RENDEZVOUS_MAGIC: [u8; 4] = *b"NRLY";

/// Magic bytes at the beginning of every peer-session frame.
pub const PEER_MAGIC: [u8; 2] = *b"FL";

/// Wire-format version, shared by both protocols.
pub const VERSION: u8 = 1;

/// Fixed peer-session header length in bytes (wire format).
pub const HEADER_LEN: usize = 8;

/// Stream framing prefix length in bytes for reliable peer-session channels.
///
/// Reliable streams are byte streams, so each message is framed as:
/// `[u32 frame_len_le][Header][Payload]`.
pub const STREAM_LEN_PREFIX: usize = 4;

/// Number of trailing inputs (including the current one) carried in every
/// input packet, so that a single dropped datagram does not stall playback.
pub const REDUNDANCY: usize = 4;

/// Maximum payload size for control messages.
pub const MAX_CONTROL_PAYLOAD: usize = 4 * 1024;

/// Maximum payload size for bulk messages (save-game transfer, settings).
pub const MAX_BULK_PAYLOAD: usize = 2 * 1024 * 1024;

/// Maximum payload size for unreliable datagrams (input packets).
///
/// Kept below typical path MTU to reduce fragmentation risk.
pub const MAX_DATAGRAM_PAYLOAD: usize = 1200;

/// Maximum total stream frame size (header + payload).
pub const MAX_STREAM_FRAME: usize = HEADER_LEN + MAX_BULK_PAYLOAD;

/// Rendezvous re-send interval in milliseconds.
pub const RENDEZVOUS_RESEND_MS: u64 = 500;

/// Rendezvous overall timeout in milliseconds.
pub const RENDEZVOUS_TIMEOUT_MS: u64 = 120_000;
