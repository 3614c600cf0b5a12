use crate::{
    constants::{HEADER_LEN, PEER_MAGIC, VERSION},
    error::ProtoError,
};

/// Peer-session packet header (wire format).
///
/// - Fixed size: exactly [`HEADER_LEN`] bytes.
/// - Integer fields are little-endian.
#[derive(Debug, Clone, Copy)]
pub struct Header {
    pub version: u8,
    pub msg_id: u8,
    pub payload_len: u32,
}

impl Header {
    pub const LEN: usize = HEADER_LEN;

    pub fn new(msg_id: u8) -> Self {
        Self {
            version: VERSION,
            msg_id,
            payload_len: 0,
        }
    }

    /// Offsets (bytes): 0..2 magic, 2 version, 3 msg_id, 4..8 payload_len (u32 LE).
    pub fn encode_into(&self, out: &mut [u8; HEADER_LEN]) {
        out[0..2].copy_from_slice(&PEER_MAGIC);
        out[2] = self.version;
        out[3] = self.msg_id;
        out[4..8].copy_from_slice(&self.payload_len.to_le_bytes());
    }

    pub fn decode(buf: &[u8]) -> Result<(Header, &[u8]), ProtoError> {
        if buf.len() < HEADER_LEN {
            return Err(ProtoError::TooShort);
        }
        if buf[0..2] != PEER_MAGIC {
            return Err(ProtoError::BadMagic);
        }
        let version = buf[2];
        if version != VERSION {
            return Err(ProtoError::UnsupportedVersion(version));
        }
        let msg_id = buf[3];
        let payload_len = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        let payload_len_usize = payload_len as usize;
        if buf.len() != HEADER_LEN + payload_len_usize {
            return Err(ProtoError::LengthMismatch);
        }
        Ok((
            Header {
                version,
                msg_id,
                payload_len,
            },
            &buf[HEADER_LEN..],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_len_is_locked() {
        assert_eq!(Header::LEN, 8);
    }

    #[test]
    fn header_round_trips() {
        let mut h = Header::new(14);
        h.payload_len = 5;
        let mut hbuf = [0u8; HEADER_LEN];
        h.encode_into(&mut hbuf);

        let mut packet = vec![0u8; HEADER_LEN + 5];
        packet[..HEADER_LEN].copy_from_slice(&hbuf);
        packet[HEADER_LEN..].copy_from_slice(&[1, 2, 3, 4, 5]);

        let (decoded, payload) = Header::decode(&packet).unwrap();
        assert_eq!(decoded.msg_id, 14);
        assert_eq!(decoded.payload_len, 5);
        assert_eq!(payload, &[1, 2, 3, 4, 5]);
    }
}
