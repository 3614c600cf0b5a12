//! The emulator-host boundary.
//!
//! CPU interpretation, the RCP, video/audio plugins, and ROM loading are
//! external collaborators: this crate defines only the contract the
//! synchronization core needs from whatever concrete emulator host it is
//! grafted onto, plus a deterministic in-memory [`MockHost`] for tests.

pub mod error;
pub mod mock;

pub use error::HostError;

/// Size of the N64 main RAM buffer this crate addresses.
pub const RDRAM_SIZE: usize = 8 * 1024 * 1024;

/// Translate an N64 virtual address into a RAM word index: `phys = vaddr &
/// 0x3FFFFF`, `word_index = phys >> 2`. Every `RamAccess` implementer shares
/// this one translation rather than rolling its own.
pub fn translate_vaddr(vaddr: u32) -> usize {
    let phys = (vaddr & 0x3FFFFF) as usize;
    phys >> 2
}

/// Direct byte access to the emulator's main RAM buffer.
///
/// Addresses are N64 virtual addresses; implementers translate internally
/// via [`translate_vaddr`].
pub trait RamAccess {
    /// Read a big-endian 32-bit word at the given virtual address.
    ///
    /// Returns `None` if the address does not land inside RAM.
    fn read_word(&self, vaddr: u32) -> Option<u32>;

    /// Write a big-endian 32-bit word at the given virtual address.
    ///
    /// Returns `false` if the address does not land inside RAM.
    fn write_word(&mut self, vaddr: u32, value: u32) -> bool;

    /// Borrow the full RAM buffer for scans (symbol location).
    fn ram(&self) -> &[u8];
}

/// Opaque, bit-exact, deterministic save/restore of the full emulator state.
///
/// The blob format is fixed by the concrete host; this crate never inspects
/// its contents, only moves it in and out of the state ring.
pub trait SaveStateHost {
    /// Serialize the full emulator state into a fresh buffer.
    fn save_state(&self) -> Result<Vec<u8>, HostError>;

    /// Restore the full emulator state from a previously captured buffer.
    fn load_state(&mut self, blob: &[u8]) -> Result<(), HostError>;
}

/// A monotonic millisecond clock, used for the bounded suspension points in
/// the concurrency model (buffer-target stall, setup timeouts).
pub trait MonotonicClock {
    fn now_ms(&self) -> u64;
}

/// Queues an asynchronous "load savestate" job; used exactly once at the
/// start of playback to load the session's initial snapshot.
pub trait AsyncSaveJob {
    fn queue_load(&mut self, blob: Vec<u8>) -> Result<(), HostError>;
}

/// Full boundary the synchronization core requires from the emulator host.
pub trait EmulatorHost: RamAccess + SaveStateHost + MonotonicClock + AsyncSaveJob {}

impl<T> EmulatorHost for T where T: RamAccess + SaveStateHost + MonotonicClock + AsyncSaveJob {}
