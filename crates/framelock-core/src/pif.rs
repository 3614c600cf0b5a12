//! PIF controller-transaction handling for `update_input`.
//!
//! The emulator hands the core a small transaction buffer per polled
//! channel; the core answers with a canned response for a "raw controller"
//! (no accessory pak, standard buttons/stick) driven by whatever the input
//! bus currently holds.

/// PIF command bytes (channel command, first byte of the transaction).
pub const JCMD_CONTROLLER_READ: u8 = 0x01;
pub const JCMD_STATUS: u8 = 0x00;
pub const JCMD_RESET: u8 = 0xFF;
pub const JCMD_PAK_READ: u8 = 0x02;
pub const JCMD_PAK_WRITE: u8 = 0x03;

/// Status response for a standard controller with no accessory pak.
const JDT_JOY_ABS_COUNTERS: u8 = 0x01;
const JDT_JOY_PORT: u8 = 0x05;

/// A single PIF channel transaction: input command bytes in, response bytes
/// out. Buffer sizes mirror the real PIF RAM layout for these commands.
#[derive(Debug, Clone)]
pub struct PifTransaction {
    pub command: u8,
    pub response: Vec<u8>,
}

/// Answer one PIF transaction for a raw-mode controller backed by `raw`
/// (the 32-bit decoded input word for this port).
pub fn handle_transaction(command: u8, raw: u32) -> PifTransaction {
    let response = match command {
        JCMD_STATUS | JCMD_RESET => {
            vec![JDT_JOY_ABS_COUNTERS, JDT_JOY_PORT, 0x00]
        }
        JCMD_CONTROLLER_READ => {
            let bytes = raw.to_be_bytes();
            // Controller read response is button-high, button-low, stick-x, stick-y.
            vec![bytes[0], bytes[1], bytes[2], bytes[3]]
        }
        JCMD_PAK_READ => {
            // No accessory pak present: synthesize an all-zero 32-byte block
            // plus a CRC byte that matches "pak absent".
            let mut resp = vec![0u8; 32];
            resp.push(0x00);
            resp
        }
        JCMD_PAK_WRITE => {
            vec![0x00]
        }
        other => {
            vec![other]
        }
    };
    PifTransaction { command, response }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_response_reports_no_pak() {
        let t = handle_transaction(JCMD_STATUS, 0);
        assert_eq!(t.response, vec![JDT_JOY_ABS_COUNTERS, JDT_JOY_PORT, 0x00]);
    }

    #[test]
    fn controller_read_echoes_raw_input() {
        let t = handle_transaction(JCMD_CONTROLLER_READ, 0x0000_8000);
        assert_eq!(t.response, vec![0x00, 0x00, 0x80, 0x00]);
    }

    #[test]
    fn pak_read_reports_absent() {
        let t = handle_transaction(JCMD_PAK_READ, 0);
        assert_eq!(t.response.len(), 33);
        assert!(t.response.iter().all(|&b| b == 0));
    }
}
