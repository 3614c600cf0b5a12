//! Game Probe (C4): read-only and small patched writes into emulator RAM to
//! observe game state.

use framelock_host::RamAccess;
use tracing::warn;

/// Game status values, drawn from the game itself; the numeric values matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Wait,
    Ongoing,
    Paused,
    Unpaused,
    Results,
    Reset,
    Unknown(u32),
}

impl GameStatus {
    pub fn from_word(word: u32) -> Self {
        match word {
            0 => Self::Wait,
            65536 => Self::Ongoing,
            131072 => Self::Paused,
            196608 => Self::Unpaused,
            458752 => Self::Results,
            16777216 => Self::Reset,
            other => Self::Unknown(other),
        }
    }

    /// True for either of the two "game is actively running" statuses,
    /// replacing a suspected source bug where the original compared two
    /// statuses with a semicolon-separated expression whose result was
    /// discarded.
    pub fn is_active(self) -> bool {
        matches!(self, GameStatus::Ongoing | GameStatus::Unpaused)
    }
}

/// Virtual addresses the probe reads; fixed by the specific ROM this core
/// targets, not by any portability concern (the spec's game-specific RAM
/// pokes are an intentional feature).
#[derive(Debug, Clone, Copy)]
pub struct ProbeAddresses {
    pub game_status: u32,
    pub stage_id: u32,
    pub current_screen: u32,
    pub last_screen: u32,
    pub back_button_routine: u32,
}

/// Read-only and small-patched-write access to emulator RAM for observing
/// and nudging game state.
pub struct GameProbe {
    addrs: ProbeAddresses,
}

impl GameProbe {
    pub fn new(addrs: ProbeAddresses) -> Self {
        Self { addrs }
    }

    fn read(&self, host: &impl RamAccess, vaddr: u32) -> u32 {
        host.read_word(vaddr).unwrap_or_else(|| {
            warn!(vaddr = format!("{vaddr:#010x}"), "game probe read out of range");
            0
        })
    }

    pub fn game_status(&self, host: &impl RamAccess) -> GameStatus {
        GameStatus::from_word(self.read(host, self.addrs.game_status))
    }

    pub fn stage_id(&self, host: &impl RamAccess) -> u32 {
        self.read(host, self.addrs.stage_id)
    }

    pub fn current_screen(&self, host: &impl RamAccess) -> u32 {
        self.read(host, self.addrs.current_screen)
    }

    pub fn last_screen(&self, host: &impl RamAccess) -> u32 {
        self.read(host, self.addrs.last_screen)
    }

    /// Patch the back-button routine into a trivial return: `addiu v0,r0,0`
    /// then `jr ra`.
    pub fn disable_back_button(&self, host: &mut impl RamAccess) {
        const ADDIU_V0_R0_0: u32 = 0x2402_0000;
        const JR_RA: u32 = 0x03E0_0008;
        host.write_word(self.addrs.back_button_routine, ADDIU_V0_R0_0);
        host.write_word(self.addrs.back_button_routine + 4, JR_RA);
    }

    /// Locate a NUL-terminated label in RAM, then scan word-aligned for a
    /// big-endian 32-bit pointer whose low 29 bits equal the label's offset
    /// and whose top nibble denotes an N64 cached (0x8) or uncached (0xA)
    /// segment.
    pub fn locate_symbol(&self, host: &impl RamAccess, name: &[u8]) -> Option<u32> {
        let ram = host.ram();
        let label_offset = find_label(ram, name)?;

        let mut i = 0usize;
        while i + 4 <= ram.len() {
            let word = u32::from_be_bytes(ram[i..i + 4].try_into().unwrap());
            let low29 = word & 0x1FFF_FFFF;
            let top_nibble = word >> 28;
            if low29 as usize == label_offset && (top_nibble == 0x8 || top_nibble == 0xA) {
                return Some(word);
            }
            i += 4;
        }
        None
    }
}

fn find_label(ram: &[u8], name: &[u8]) -> Option<usize> {
    if name.is_empty() {
        return None;
    }
    ram.windows(name.len() + 1)
        .position(|w| &w[..name.len()] == name && w[name.len()] == 0)
}
