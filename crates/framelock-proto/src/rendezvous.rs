//! Rendezvous broker handshake (C5).
//!
//! Wire format is big-endian and hand-encoded rather than `postcard`-framed:
//! these bytes cross a broker implemented independently of this codebase, so
//! the exact layout is load-bearing. Every message begins with the four magic
//! bytes `NRLY`, a one-byte version, and a one-byte type.

use std::net::Ipv4Addr;

use crate::{
    constants::{RENDEZVOUS_MAGIC, VERSION},
    error::ProtoError,
};

const TYPE_HELLO: u8 = 0x01;
const TYPE_READY: u8 = 0x02;
const TYPE_ERROR: u8 = 0x03;

/// Rejection codes carried by an `ERROR` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendezvousErrorCode {
    InvalidToken,
    TokenExpired,
    RoleTaken,
    UnknownRoom,
    Malformed,
    RateLimited,
    Unknown(u8),
}

impl RendezvousErrorCode {
    fn from_byte(b: u8) -> Self {
        match b {
            0 => Self::InvalidToken,
            1 => Self::TokenExpired,
            2 => Self::RoleTaken,
            3 => Self::UnknownRoom,
            4 => Self::Malformed,
            5 => Self::RateLimited,
            other => Self::Unknown(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::InvalidToken => 0,
            Self::TokenExpired => 1,
            Self::RoleTaken => 2,
            Self::UnknownRoom => 3,
            Self::Malformed => 4,
            Self::RateLimited => 5,
            Self::Unknown(b) => b,
        }
    }
}

/// A decoded rendezvous message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousMessage {
    /// Client → broker: request a peer address for `token`, announcing the
    /// local UDP port that will also carry peer traffic.
    Hello {
        token: Vec<u8>,
        local_data_port: u16,
    },
    /// Broker → client: the peer's public address.
    Ready { peer_ip: Ipv4Addr, peer_port: u16 },
    /// Broker → client: the request was rejected.
    Error { code: RendezvousErrorCode },
}

impl RendezvousMessage {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        out.extend_from_slice(&RENDEZVOUS_MAGIC);
        out.push(VERSION);
        match self {
            RendezvousMessage::Hello {
                token,
                local_data_port,
            } => {
                out.push(TYPE_HELLO);
                out.extend_from_slice(&(token.len() as u16).to_be_bytes());
                out.extend_from_slice(token);
                out.extend_from_slice(&local_data_port.to_be_bytes());
                out.push(0);
            }
            RendezvousMessage::Ready { peer_ip, peer_port } => {
                out.push(TYPE_READY);
                out.extend_from_slice(&u32::from(*peer_ip).to_be_bytes());
                out.extend_from_slice(&peer_port.to_be_bytes());
            }
            RendezvousMessage::Error { code } => {
                out.push(TYPE_ERROR);
                out.push(code.to_byte());
            }
        }
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtoError> {
        if buf.len() < 6 {
            return Err(ProtoError::TooShort);
        }
        if buf[0..4] != RENDEZVOUS_MAGIC {
            return Err(ProtoError::BadMagic);
        }
        let version = buf[4];
        if version != VERSION {
            return Err(ProtoError::UnsupportedVersion(version));
        }
        let msg_type = buf[5];
        let body = &buf[6..];

        match msg_type {
            TYPE_HELLO => {
                if body.len() < 2 {
                    return Err(ProtoError::TooShort);
                }
                let token_len = u16::from_be_bytes([body[0], body[1]]) as usize;
                if body.len() < 2 + token_len + 2 + 1 {
                    return Err(ProtoError::TooShort);
                }
                let token = body[2..2 + token_len].to_vec();
                let port_off = 2 + token_len;
                let local_data_port = u16::from_be_bytes([body[port_off], body[port_off + 1]]);
                let terminator = body[port_off + 2];
                if terminator != 0 {
                    return Err(ProtoError::LengthMismatch);
                }
                Ok(RendezvousMessage::Hello {
                    token,
                    local_data_port,
                })
            }
            TYPE_READY => {
                if body.len() < 6 {
                    return Err(ProtoError::TooShort);
                }
                let ip_bits = u32::from_be_bytes(body[0..4].try_into().unwrap());
                let peer_port = u16::from_be_bytes([body[4], body[5]]);
                Ok(RendezvousMessage::Ready {
                    peer_ip: Ipv4Addr::from(ip_bits),
                    peer_port,
                })
            }
            TYPE_ERROR => {
                if body.is_empty() {
                    return Err(ProtoError::TooShort);
                }
                Ok(RendezvousMessage::Error {
                    code: RendezvousErrorCode::from_byte(body[0]),
                })
            }
            other => Err(ProtoError::UnknownRendezvousType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_round_trips() {
        let msg = RendezvousMessage::Hello {
            token: b"abcd".to_vec(),
            local_data_port: 51234,
        };
        let bytes = msg.encode();
        assert_eq!(&bytes[0..4], b"NRLY");
        let decoded = RendezvousMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn ready_round_trips_with_literal_scenario_values() {
        let msg = RendezvousMessage::Ready {
            peer_ip: "192.168.1.5".parse().unwrap(),
            peer_port: 55555,
        };
        let bytes = msg.encode();
        let decoded = RendezvousMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn error_round_trips() {
        let msg = RendezvousMessage::Error {
            code: RendezvousErrorCode::TokenExpired,
        };
        let bytes = msg.encode();
        let decoded = RendezvousMessage::decode(&bytes).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn rejects_bad_magic() {
        let mut bytes = RendezvousMessage::Error {
            code: RendezvousErrorCode::Malformed,
        }
        .encode();
        bytes[0] = b'X';
        assert!(matches!(
            RendezvousMessage::decode(&bytes),
            Err(ProtoError::BadMagic)
        ));
    }
}
