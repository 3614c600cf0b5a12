//! Input Bus (C2): per-port latched input for the current frame.

use tracing::warn;

use framelock_proto::input_word::{self, InputState};

const PORTS: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Slot {
    raw: u32,
    present: bool,
    from_playback: bool,
    latched_frame: u64,
}

impl Default for Slot {
    fn default() -> Self {
        Self {
            raw: 0,
            present: false,
            from_playback: false,
            latched_frame: 0,
        }
    }
}

/// Per-port latched input for the currently-clocked frame.
#[derive(Debug, Clone)]
pub struct InputBus {
    slots: [Slot; PORTS],
    latched_frame: u64,
}

impl InputBus {
    pub fn new() -> Self {
        Self {
            slots: [Slot::default(); PORTS],
            latched_frame: 0,
        }
    }

    /// Reset per-port `present`/`from_playback` to false and publish `frame`
    /// as the current latched frame.
    pub fn latch(&mut self, frame: u64) {
        self.latched_frame = frame;
        for slot in &mut self.slots {
            slot.present = false;
            slot.from_playback = false;
            slot.latched_frame = frame;
        }
    }

    /// Store the raw word for `port` at the current latched frame.
    ///
    /// A second `record` for the same (port, latched frame) silently
    /// replaces the first: last-writer-wins, so a late playback correction
    /// overrides an earlier speculative live read.
    pub fn record(&mut self, port: u8, frame: u64, raw: u32, from_playback: bool) {
        let Some(slot) = self.slots.get_mut(port as usize) else {
            warn!(port, "input_bus.record: invalid port");
            return;
        };
        if frame != self.latched_frame {
            warn!(
                port,
                frame, latched_frame = self.latched_frame, "input_bus.record: frame mismatch"
            );
        }
        slot.raw = raw;
        slot.present = true;
        slot.from_playback = from_playback;
        slot.latched_frame = self.latched_frame;
    }

    pub fn raw(&self, port: u8) -> u32 {
        self.slots.get(port as usize).map(|s| s.raw).unwrap_or(0)
    }

    pub fn present(&self, port: u8) -> bool {
        self.slots
            .get(port as usize)
            .map(|s| s.present)
            .unwrap_or(false)
    }

    pub fn from_playback(&self, port: u8) -> bool {
        self.slots
            .get(port as usize)
            .map(|s| s.from_playback)
            .unwrap_or(false)
    }

    pub fn latched_frame(&self) -> u64 {
        self.latched_frame
    }
}

impl Default for InputBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Pure decode helper: buttons = low 16 bits, X = signed byte 2, Y = signed byte 3.
pub fn decode(raw: u32) -> InputState {
    input_word::decode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_resets_presence_and_publishes_frame() {
        let mut bus = InputBus::new();
        bus.latch(5);
        bus.record(0, 5, 0xABCD, false);
        assert!(bus.present(0));
        assert_eq!(bus.raw(0), 0xABCD);

        bus.latch(6);
        assert!(!bus.present(0));
        assert_eq!(bus.latched_frame(), 6);
    }

    #[test]
    fn second_record_for_same_frame_replaces_first() {
        let mut bus = InputBus::new();
        bus.latch(1);
        bus.record(2, 1, 0x1111, false);
        bus.record(2, 1, 0x2222, true);
        assert_eq!(bus.raw(2), 0x2222);
        assert!(bus.from_playback(2));
    }

    #[test]
    fn invalid_port_is_ignored_not_panicking() {
        let mut bus = InputBus::new();
        bus.latch(0);
        bus.record(9, 0, 0x1, false);
        assert_eq!(bus.raw(9), 0);
        assert!(!bus.present(9));
    }
}
