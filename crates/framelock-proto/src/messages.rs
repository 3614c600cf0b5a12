//! Peer-session message payloads (§4.6).
//!
//! Payloads are `postcard`-encoded; only the outer [`crate::header::Header`]
//! has a load-bearing byte layout.

use serde::{Deserialize, Serialize};

/// A single input sample carried inside a key-info packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub frame: u32,
    pub raw: u32,
    pub plugin: u8,
}

/// `MsgId::RegisterPlayer` (14).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPlayer {
    pub player: u8,
    pub plugin: u8,
    pub raw: u8,
    pub reg_id: u32,
}

/// Ack of `RegisterPlayer`, sent as `MsgId::RegisterAck` (2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAck {
    pub player_id: u8,
    pub buffer_target: u8,
}

/// `MsgId::GetRegistration` (15). Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRegistration;

/// Per-slot registration info inside `ReceiveRegistration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSlot {
    pub reg_id: u32,
    pub plugin: u8,
    pub raw: u8,
}

/// `MsgId::ReceiveRegistration` (16): exactly four port slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveRegistration {
    pub slots: [RegistrationSlot; 4],
}

/// `MsgId::ClientReady` (17). Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReady;

/// `MsgId::SendSettings` (12): six emulator settings words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSettings {
    pub settings: [u32; 6],
}

/// `MsgId::SendSave` (10). An all-zeroes `bytes` means "no save file exists".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendSave {
    pub extension: String,
    pub bytes: Vec<u8>,
}

/// `MsgId::ReceiveSave` (11): a request for the peer's save. Empty body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveSave;

/// `MsgId::SendKeyInfo` (0): client to host, local inputs with redundancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendKeyInfo {
    pub player: u8,
    pub sender_vi: u64,
    pub events: Vec<InputEvent>,
}

/// `MsgId::ReceiveKeyInfo` (1): host to client, remote inputs with redundancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveKeyInfo {
    pub player: u8,
    pub status: u32,
    pub lag: u32,
    pub sender_vi: u64,
    pub events: Vec<InputEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_save_all_zero_means_no_save() {
        let msg = SendSave {
            extension: "sra".to_string(),
            bytes: vec![0u8; 32],
        };
        assert!(msg.bytes.iter().all(|b| *b == 0));
    }
}
