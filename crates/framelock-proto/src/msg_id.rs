//! Peer-session message identifiers.
//!
//! Values are fixed by the wire protocol, not auto-assigned: several codes
//! are non-contiguous because they were carried over from the broker's own
//! numbering.

use strum::FromRepr;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromRepr)]
pub enum MsgId {
    SendKeyInfo = 0,
    ReceiveKeyInfo = 1,
    RegisterAck = 2,
    SendSave = 10,
    ReceiveSave = 11,
    SendSettings = 12,
    RegisterPlayer = 14,
    GetRegistration = 15,
    ReceiveRegistration = 16,
    ClientReady = 17,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_the_wire_protocol() {
        assert_eq!(MsgId::SendKeyInfo as u8, 0);
        assert_eq!(MsgId::ReceiveKeyInfo as u8, 1);
        assert_eq!(MsgId::SendSave as u8, 10);
        assert_eq!(MsgId::ReceiveSave as u8, 11);
        assert_eq!(MsgId::SendSettings as u8, 12);
        assert_eq!(MsgId::RegisterPlayer as u8, 14);
        assert_eq!(MsgId::GetRegistration as u8, 15);
        assert_eq!(MsgId::ReceiveRegistration as u8, 16);
        assert_eq!(MsgId::ClientReady as u8, 17);
    }

    #[test]
    fn from_repr_round_trips() {
        for id in [
            MsgId::SendKeyInfo,
            MsgId::ReceiveKeyInfo,
            MsgId::RegisterAck,
            MsgId::SendSave,
            MsgId::ReceiveSave,
            MsgId::SendSettings,
            MsgId::RegisterPlayer,
            MsgId::GetRegistration,
            MsgId::ReceiveRegistration,
            MsgId::ClientReady,
        ] {
            assert_eq!(MsgId::from_repr(id as u8), Some(id));
        }
        assert_eq!(MsgId::from_repr(99), None);
    }
}
