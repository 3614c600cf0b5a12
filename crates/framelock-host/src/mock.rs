//! Deterministic in-memory host for unit and integration tests.

use crate::{
    error::HostError, translate_vaddr, AsyncSaveJob, MonotonicClock, RamAccess, SaveStateHost,
    RDRAM_SIZE,
};

/// A fully in-memory `EmulatorHost` implementation.
///
/// RAM is a flat buffer; "save state" is just a copy of that buffer plus a
/// tick counter, which is all the determinism the synchronization core
/// actually needs to exercise against.
#[derive(Debug, Clone)]
pub struct MockHost {
    ram: Vec<u8>,
    clock_ms: u64,
    pending_load: Option<Vec<u8>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            ram: vec![0u8; RDRAM_SIZE],
            clock_ms: 0,
            pending_load: None,
        }
    }

    /// Advance the mock clock by a fixed amount; tests drive time explicitly
    /// rather than relying on wall-clock nondeterminism.
    pub fn advance_clock_ms(&mut self, delta: u64) {
        self.clock_ms = self.clock_ms.saturating_add(delta);
    }

    pub fn take_pending_load(&mut self) -> Option<Vec<u8>> {
        self.pending_load.take()
    }

    /// Direct mutable access to the backing buffer, for tests that need to
    /// poke raw bytes (e.g. symbol-scan fixtures) without going through the
    /// word-addressed `RamAccess` API.
    pub fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl RamAccess for MockHost {
    fn read_word(&self, vaddr: u32) -> Option<u32> {
        let start = translate_vaddr(vaddr) * 4;
        if start + 4 > self.ram.len() {
            return None;
        }
        Some(u32::from_be_bytes(
            self.ram[start..start + 4].try_into().unwrap(),
        ))
    }

    fn write_word(&mut self, vaddr: u32, value: u32) -> bool {
        let start = translate_vaddr(vaddr) * 4;
        if start + 4 > self.ram.len() {
            return false;
        }
        self.ram[start..start + 4].copy_from_slice(&value.to_be_bytes());
        true
    }

    fn ram(&self) -> &[u8] {
        &self.ram
    }
}

impl SaveStateHost for MockHost {
    fn save_state(&self) -> Result<Vec<u8>, HostError> {
        Ok(self.ram.clone())
    }

    fn load_state(&mut self, blob: &[u8]) -> Result<(), HostError> {
        if blob.len() != self.ram.len() {
            return Err(HostError::SizeMismatch {
                expected: self.ram.len(),
                got: blob.len(),
            });
        }
        self.ram.copy_from_slice(blob);
        Ok(())
    }
}

impl MonotonicClock for MockHost {
    fn now_ms(&self) -> u64 {
        self.clock_ms
    }
}

impl AsyncSaveJob for MockHost {
    fn queue_load(&mut self, blob: Vec<u8>) -> Result<(), HostError> {
        self.pending_load = Some(blob);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_write_round_trips_through_phys_translation() {
        let mut host = MockHost::new();
        assert!(host.write_word(0x8000_1000, 0xDEAD_BEEF));
        assert_eq!(host.read_word(0x8000_1000), Some(0xDEAD_BEEF));
        // cached and uncached views of the same physical word alias.
        assert_eq!(host.read_word(0xA000_1000), Some(0xDEAD_BEEF));
    }

    #[test]
    fn out_of_range_address_returns_none() {
        let host = MockHost::new();
        assert_eq!(host.read_word(0x00C0_0000), None);
    }

    #[test]
    fn save_then_load_round_trips() {
        let mut host = MockHost::new();
        host.write_word(0, 0x1234_5678);
        let snap = host.save_state().unwrap();

        host.write_word(0, 0);
        host.load_state(&snap).unwrap();
        assert_eq!(host.read_word(0), Some(0x1234_5678));
    }
}
