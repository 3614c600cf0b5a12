//! Peer Session (C6): the message pump over a [`QuicPeer`] — framed
//! control/bulk streams plus unreliable input datagrams, and the
//! buffer-target flow-control stall.

use std::time::Duration;

use bytes::Bytes;
use futures_util::FutureExt;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tracing::warn;

use framelock_proto::codec::{
    decode_datagram, encode_datagram, encode_stream_frame, try_decode_stream_frames,
    DecodedMessage,
};
use framelock_proto::constants::{MAX_BULK_PAYLOAD, MAX_CONTROL_PAYLOAD};
use framelock_proto::header::Header;
use framelock_proto::msg_id::MsgId;

use crate::error::NetError;
use crate::quic_peer::QuicPeer;

const STALL_CEILING: Duration = Duration::from_millis(500);

/// A message received on one of the three logical channels.
#[derive(Debug, Clone)]
pub enum RecvOutcome {
    Control(DecodedMessage),
    Bulk(DecodedMessage),
    Input(DecodedMessage),
    Disconnected,
}

pub struct PeerSession {
    quic: QuicPeer,
    control_buf: Vec<u8>,
    bulk_buf: Vec<u8>,
    /// Highest `sender_vi` observed across all input packets so far.
    remote_frame: u64,
}

impl PeerSession {
    pub fn new(quic: QuicPeer) -> Self {
        Self {
            quic,
            control_buf: Vec::new(),
            bulk_buf: Vec::new(),
            remote_frame: 0,
        }
    }

    pub fn remote_frame(&self) -> u64 {
        self.remote_frame
    }

    pub async fn send_control<T: serde::Serialize>(
        &mut self,
        msg_id: MsgId,
        payload: &T,
    ) -> Result<(), NetError> {
        let frame = encode_stream_frame(Header::new(0), msg_id, payload, MAX_CONTROL_PAYLOAD)?;
        self.quic.control_send.write_all(&frame).await?;
        Ok(())
    }

    pub async fn send_bulk<T: serde::Serialize>(
        &mut self,
        msg_id: MsgId,
        payload: &T,
    ) -> Result<(), NetError> {
        let frame = encode_stream_frame(Header::new(0), msg_id, payload, MAX_BULK_PAYLOAD)?;
        self.quic.bulk_send.write_all(&frame).await?;
        Ok(())
    }

    /// Send an input packet (current input plus up to `REDUNDANCY-1`
    /// predecessors) over the unreliable datagram path.
    pub fn send_input<T: serde::Serialize>(
        &self,
        payload: &T,
        msg_id: MsgId,
    ) -> Result<(), NetError> {
        let bytes = encode_datagram(Header::new(0), msg_id, payload)?;
        self.quic.connection.send_datagram(Bytes::from(bytes))?;
        Ok(())
    }

    /// Drain everything currently available without blocking: complete
    /// frames on the control and bulk streams, and all buffered datagrams.
    pub async fn drain(&mut self) -> Vec<RecvOutcome> {
        let mut out = Vec::new();

        let mut chunk = [0u8; 4096];
        while let Some(result) = self.quic.control_recv.read(&mut chunk).now_or_never() {
            match result {
                Ok(0) => {
                    out.push(RecvOutcome::Disconnected);
                    break;
                }
                Ok(n) => self.control_buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "control stream read error");
                    break;
                }
            }
        }
        match try_decode_stream_frames(&self.control_buf) {
            Ok((frames, consumed)) => {
                self.control_buf.drain(..consumed);
                out.extend(frames.into_iter().map(RecvOutcome::Control));
            }
            Err(e) => warn!(error = %e, "control stream protocol error, dropping buffer"),
        }

        while let Some(result) = self.quic.bulk_recv.read(&mut chunk).now_or_never() {
            match result {
                Ok(0) => {
                    out.push(RecvOutcome::Disconnected);
                    break;
                }
                Ok(n) => self.bulk_buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "bulk stream read error");
                    break;
                }
            }
        }
        match try_decode_stream_frames(&self.bulk_buf) {
            Ok((frames, consumed)) => {
                self.bulk_buf.drain(..consumed);
                out.extend(frames.into_iter().map(RecvOutcome::Bulk));
            }
            Err(e) => warn!(error = %e, "bulk stream protocol error, dropping buffer"),
        }

        while let Some(result) = self.quic.connection.read_datagram().now_or_never() {
            match result {
                Ok(datagram) => match decode_datagram(&datagram) {
                    Ok(msg) => out.push(RecvOutcome::Input(msg)),
                    Err(e) => warn!(error = %e, "malformed input datagram, dropping"),
                },
                Err(_closed) => {
                    out.push(RecvOutcome::Disconnected);
                    break;
                }
            }
        }

        out
    }

    /// §4.6 flow control: after processing an input packet, `remote_frame`
    /// was already updated to `max(remote_frame, sender_vi)` by the caller.
    /// This updates it from a freshly observed `sender_vi`.
    pub fn observe_remote_vi(&mut self, sender_vi: u64) {
        self.remote_frame = self.remote_frame.max(sender_vi);
    }

    /// Scenario 6: spin on `drain()` while `local_frame - remote_frame >
    /// buffer_target`, bounded to 500 ms, then proceed regardless.
    pub async fn stall_for_buffer_target(
        &mut self,
        local_frame: u64,
        buffer_target: u64,
    ) -> Vec<RecvOutcome> {
        let deadline = Instant::now() + STALL_CEILING;
        let mut collected = Vec::new();

        while local_frame.saturating_sub(self.remote_frame) > buffer_target {
            if Instant::now() >= deadline {
                break;
            }
            let events = self.drain().await;
            for ev in &events {
                if let RecvOutcome::Input(msg) = ev {
                    if let Ok(sender_vi) = extract_sender_vi(msg) {
                        self.observe_remote_vi(sender_vi);
                    }
                }
            }
            collected.extend(events);
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        collected
    }
}

fn extract_sender_vi(msg: &DecodedMessage) -> Result<u64, NetError> {
    use framelock_proto::messages::SendKeyInfo;
    let decoded: SendKeyInfo = postcard::from_bytes(&msg.payload)?;
    Ok(decoded.sender_vi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelock_proto::messages::SendKeyInfo;

    fn decoded_send_key_info(sender_vi: u64) -> DecodedMessage {
        let payload = SendKeyInfo {
            player: 0,
            sender_vi,
            events: Vec::new(),
        };
        DecodedMessage {
            header: Header::new(0),
            msg_id: MsgId::SendKeyInfo,
            payload: postcard::to_stdvec(&payload).unwrap(),
        }
    }

    #[test]
    fn extract_sender_vi_reads_the_input_packets_vi() {
        let msg = decoded_send_key_info(42);
        assert_eq!(extract_sender_vi(&msg).unwrap(), 42);
    }

    #[test]
    fn extract_sender_vi_rejects_mismatched_payload() {
        let msg = DecodedMessage {
            header: Header::new(0),
            msg_id: MsgId::ClientReady,
            payload: vec![0xFF; 3],
        };
        assert!(extract_sender_vi(&msg).is_err());
    }
}
