//! Framing for the peer-session protocol over reliable streams and
//! unreliable datagrams.

use crate::{
    constants::{HEADER_LEN, MAX_DATAGRAM_PAYLOAD, MAX_STREAM_FRAME, STREAM_LEN_PREFIX},
    error::ProtoError,
    header::Header,
    msg_id::MsgId,
};

/// A decoded message with an owned payload slice already split from the header.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub header: Header,
    pub msg_id: MsgId,
    pub payload: Vec<u8>,
}

/// Encode a message for a reliable stream: `[u32 frame_len_le][Header][Payload]`.
pub fn encode_stream_frame<T: serde::Serialize>(
    mut header: Header,
    msg_id: MsgId,
    payload: &T,
    max_payload: usize,
) -> Result<Vec<u8>, ProtoError> {
    let payload_bytes = postcard::to_stdvec(payload)?;
    if payload_bytes.len() > max_payload {
        return Err(ProtoError::PayloadTooLarge(payload_bytes.len()));
    }

    header.msg_id = msg_id as u8;
    header.payload_len = payload_bytes.len() as u32;

    let frame_len = HEADER_LEN + payload_bytes.len();
    if frame_len > MAX_STREAM_FRAME {
        return Err(ProtoError::FrameTooLarge(frame_len));
    }

    let mut out = Vec::with_capacity(STREAM_LEN_PREFIX + frame_len);
    out.extend_from_slice(&(frame_len as u32).to_le_bytes());
    let mut hbuf = [0u8; HEADER_LEN];
    header.encode_into(&mut hbuf);
    out.extend_from_slice(&hbuf);
    out.extend_from_slice(&payload_bytes);
    Ok(out)
}

/// Decode as many complete frames as are present in `in_buf`, returning the
/// decoded messages plus how many leading bytes were consumed.
pub fn try_decode_stream_frames(in_buf: &[u8]) -> Result<(Vec<DecodedMessage>, usize), ProtoError> {
    let mut frames = Vec::new();
    let mut offset = 0usize;

    loop {
        if in_buf.len().saturating_sub(offset) < STREAM_LEN_PREFIX {
            break;
        }
        let len_bytes: [u8; 4] = in_buf[offset..offset + STREAM_LEN_PREFIX]
            .try_into()
            .unwrap();
        let frame_len = u32::from_le_bytes(len_bytes) as usize;

        if frame_len < HEADER_LEN {
            return Err(ProtoError::LengthMismatch);
        }
        if frame_len > MAX_STREAM_FRAME {
            return Err(ProtoError::FrameTooLarge(frame_len));
        }

        let total_needed = STREAM_LEN_PREFIX + frame_len;
        if in_buf.len().saturating_sub(offset) < total_needed {
            break;
        }

        let frame = &in_buf[offset + STREAM_LEN_PREFIX..offset + total_needed];
        let (h, payload) = Header::decode(frame)?;
        let msg = MsgId::from_repr(h.msg_id).ok_or(ProtoError::UnknownMsgId(h.msg_id))?;

        frames.push(DecodedMessage {
            header: h,
            msg_id: msg,
            payload: payload.to_vec(),
        });
        offset += total_needed;
    }

    Ok((frames, offset))
}

/// Encode a message for an unreliable datagram: `[Header][Payload]`, single
/// message per datagram, no length prefix needed.
pub fn encode_datagram<T: serde::Serialize>(
    mut header: Header,
    msg_id: MsgId,
    payload: &T,
) -> Result<Vec<u8>, ProtoError> {
    let payload_bytes = postcard::to_stdvec(payload)?;
    if payload_bytes.len() > MAX_DATAGRAM_PAYLOAD {
        return Err(ProtoError::PayloadTooLarge(payload_bytes.len()));
    }

    header.msg_id = msg_id as u8;
    header.payload_len = payload_bytes.len() as u32;

    let mut out = vec![0u8; HEADER_LEN + payload_bytes.len()];
    let mut hbuf = [0u8; HEADER_LEN];
    header.encode_into(&mut hbuf);
    out[..HEADER_LEN].copy_from_slice(&hbuf);
    out[HEADER_LEN..].copy_from_slice(&payload_bytes);
    Ok(out)
}

pub fn decode_datagram(datagram: &[u8]) -> Result<DecodedMessage, ProtoError> {
    if datagram.len() > HEADER_LEN + MAX_DATAGRAM_PAYLOAD {
        return Err(ProtoError::FrameTooLarge(datagram.len()));
    }
    let (h, payload) = Header::decode(datagram)?;
    let msg = MsgId::from_repr(h.msg_id).ok_or(ProtoError::UnknownMsgId(h.msg_id))?;
    Ok(DecodedMessage {
        header: h,
        msg_id: msg,
        payload: payload.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ClientReady;

    #[test]
    fn stream_frame_round_trips() {
        let encoded = encode_stream_frame(
            Header::new(0),
            MsgId::ClientReady,
            &ClientReady,
            crate::constants::MAX_CONTROL_PAYLOAD,
        )
        .unwrap();

        let (frames, consumed) = try_decode_stream_frames(&encoded).unwrap();
        assert_eq!(consumed, encoded.len());
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_id, MsgId::ClientReady);
    }

    #[test]
    fn stream_decode_waits_for_full_frame() {
        let encoded = encode_stream_frame(
            Header::new(0),
            MsgId::ClientReady,
            &ClientReady,
            crate::constants::MAX_CONTROL_PAYLOAD,
        )
        .unwrap();

        let (frames, consumed) = try_decode_stream_frames(&encoded[..encoded.len() - 1]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(consumed, 0);
    }

    #[test]
    fn datagram_round_trips() {
        let encoded = encode_datagram(Header::new(0), MsgId::ClientReady, &ClientReady).unwrap();
        let decoded = decode_datagram(&encoded).unwrap();
        assert_eq!(decoded.msg_id, MsgId::ClientReady);
    }
}
