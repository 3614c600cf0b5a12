//! Input Ring (C7): circular buffer keyed by (port, frame).

const PORTS: usize = 4;

/// Default ring depth; must be a power of two, at least 256. 1024 is typical
/// when paired with rollback.
pub const DEFAULT_RING_SIZE: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Slot {
    count: u64,
    inputs: u32,
    plugin: u8,
    valid: bool,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            count: 0,
            inputs: 0,
            plugin: 0,
            valid: false,
        }
    }
}

/// A read view of an input ring slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingEntry {
    pub raw: u32,
    pub plugin: u8,
}

/// Per-port fixed-size array indexed by `frame mod N`.
#[derive(Debug, Clone)]
pub struct InputRing {
    size: usize,
    slots: Vec<[Slot; PORTS]>,
}

impl InputRing {
    /// `size` must be a power of two, matching the spec's invariant that the
    /// ring is keyed by `frame mod N`.
    pub fn new(size: usize) -> Self {
        assert!(size.is_power_of_two(), "input ring size must be a power of two");
        Self {
            size,
            slots: vec![[Slot::default(); PORTS]; size],
        }
    }

    fn index(&self, frame: u64) -> usize {
        (frame as usize) & (self.size - 1)
    }

    /// Write is idempotent: re-writing the same (port, frame) with identical
    /// bytes is a no-op; with different bytes it overwrites. Misprediction
    /// detection itself lives in `RollbackCoordinator::on_remote_input`,
    /// which compares against `PredictionTable`, not against this return
    /// value. Returns `true` if the write changed a previously-valid slot's
    /// value, for callers that just want to log or count overwrites.
    pub fn put(&mut self, port: u8, frame: u64, raw: u32, plugin: u8) -> bool {
        let idx = self.index(frame);
        let slot = &mut self.slots[idx][port as usize];
        let changed = slot.valid && slot.count == frame && slot.inputs != raw;
        slot.count = frame;
        slot.inputs = raw;
        slot.plugin = plugin;
        slot.valid = true;
        changed
    }

    pub fn has(&self, port: u8, frame: u64) -> bool {
        let idx = self.index(frame);
        let slot = &self.slots[idx][port as usize];
        slot.valid && slot.count == frame
    }

    pub fn get(&self, port: u8, frame: u64) -> Option<RingEntry> {
        let idx = self.index(frame);
        let slot = &self.slots[idx][port as usize];
        if slot.valid && slot.count == frame {
            Some(RingEntry {
                raw: slot.inputs,
                plugin: slot.plugin,
            })
        } else {
            None
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Default for InputRing {
    fn default() -> Self {
        Self::new(DEFAULT_RING_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_then_get_round_trips() {
        let mut ring = InputRing::new(256);
        ring.put(0, 10, 0xDEAD, 1);
        assert!(ring.has(0, 10));
        assert_eq!(
            ring.get(0, 10),
            Some(RingEntry {
                raw: 0xDEAD,
                plugin: 1
            })
        );
    }

    #[test]
    fn wrap_rejects_stale_entry() {
        let mut ring = InputRing::new(256);
        ring.put(0, 256, 0x1, 0);
        // frame=0 and frame=256 collide in the same slot; the stale 0 must
        // be rejected once 256 has been written.
        assert!(!ring.has(0, 0));
        assert!(ring.has(0, 256));
    }

    #[test]
    fn idempotent_write_same_value_is_a_no_op() {
        let mut ring = InputRing::new(256);
        assert!(!ring.put(0, 5, 0xAA, 0));
        assert!(!ring.put(0, 5, 0xAA, 0));
        assert_eq!(ring.get(0, 5).unwrap().raw, 0xAA);
    }

    #[test]
    fn differing_rewrite_reports_change() {
        let mut ring = InputRing::new(256);
        ring.put(0, 5, 0xAA, 0);
        assert!(ring.put(0, 5, 0xBB, 0));
        assert_eq!(ring.get(0, 5).unwrap().raw, 0xBB);
    }

    #[test]
    #[should_panic]
    fn non_power_of_two_size_panics() {
        let _ = InputRing::new(300);
    }
}
