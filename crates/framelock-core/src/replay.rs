//! Replay Log (C3): append-only per-frame input record with deterministic
//! playback.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::warn;

use framelock_proto::input_word;

use crate::error::CoreError;

/// Encoded size of one replay record: port (i32) + frame (u64) + raw (u32).
pub const RECORD_LEN: usize = 16;

/// Number of frames a staged record must be older than the current frame
/// before it is committed to disk, guaranteeing all ports have reported.
pub const COMMIT_DELAY: u64 = 5;

/// Flush the underlying writer at least this often.
pub const FLUSH_INTERVAL_FRAMES: u64 = 60;

/// Depth of the write-side staging buffer.
pub const STAGING_DEPTH: usize = 64;

const PORTS: usize = 4;

/// A single persisted input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayRecord {
    pub port: i32,
    pub frame: u64,
    pub raw: u32,
}

impl ReplayRecord {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];
        buf[0..4].copy_from_slice(&self.port.to_le_bytes());
        buf[4..12].copy_from_slice(&self.frame.to_le_bytes());
        buf[12..16].copy_from_slice(&self.raw.to_le_bytes());
        buf
    }

    pub fn decode(buf: &[u8; RECORD_LEN]) -> Self {
        let port = i32::from_le_bytes(buf[0..4].try_into().unwrap());
        let frame = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        let raw = u32::from_le_bytes(buf[12..16].try_into().unwrap());
        Self { port, frame, raw }
    }
}

/// Write-side: stages per-frame, per-port records and commits them to the
/// underlying writer once they are old enough that all ports have reported.
pub struct ReplayWriter<W: Write> {
    writer: W,
    staged: BTreeMap<u64, [u32; PORTS]>,
    frames_since_flush: u64,
    recording_disabled: bool,
}

impl<W: Write> ReplayWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            staged: BTreeMap::new(),
            frames_since_flush: 0,
            recording_disabled: false,
        }
    }

    /// Stage all four ports' raw inputs for `frame`. Calling this twice for
    /// the same frame replaces the earlier staged values (used by the
    /// retroactive WAIT→ONGOING write rule).
    pub fn stage_frame(&mut self, frame: u64, raws: [u32; PORTS]) {
        if self.recording_disabled {
            return;
        }
        self.staged.insert(frame, raws);
        while self.staged.len() > STAGING_DEPTH {
            if let Some((&oldest, _)) = self.staged.iter().next() {
                self.staged.remove(&oldest);
            }
        }
    }

    /// Retroactively stage frame `F-1`, for the WAIT→ONGOING transition rule
    /// (§4.3): the inputs that caused the transition live in the previous
    /// frame, and the log must write them even though that frame may already
    /// have been staged (or, if it already committed, this call is a no-op
    /// for frames this old since the commit window has passed).
    pub fn retroactive_write(&mut self, frame_f_minus_1: u64, raws: [u32; PORTS]) {
        self.staged.entry(frame_f_minus_1).or_insert(raws);
    }

    fn commit_frames(&mut self, frames: Vec<u64>) -> Result<(), CoreError> {
        for frame in frames {
            let raws = self.staged.remove(&frame).unwrap();
            for (port, raw) in raws.iter().enumerate() {
                let record = ReplayRecord {
                    port: port as i32,
                    frame,
                    raw: *raw,
                };
                if let Err(e) = self.writer.write_all(&record.encode()) {
                    warn!(error = %e, "replay log write failed, disabling recording");
                    self.recording_disabled = true;
                    return Err(CoreError::ReplayIo(e.to_string()));
                }
            }
            self.frames_since_flush += 1;
        }
        Ok(())
    }

    /// Commit every staged frame at least `COMMIT_DELAY` older than
    /// `current_frame`, and flush at least every `FLUSH_INTERVAL_FRAMES`.
    pub fn advance(&mut self, current_frame: u64) -> Result<(), CoreError> {
        if self.recording_disabled {
            return Ok(());
        }
        let cutoff = current_frame.saturating_sub(COMMIT_DELAY);
        let ready: Vec<u64> = self.staged.range(..=cutoff).map(|(&f, _)| f).collect();
        self.commit_frames(ready)?;

        if self.frames_since_flush >= FLUSH_INTERVAL_FRAMES {
            if let Err(e) = self.writer.flush() {
                warn!(error = %e, "replay log flush failed, disabling recording");
                self.recording_disabled = true;
                return Err(CoreError::ReplayIo(e.to_string()));
            }
            self.frames_since_flush = 0;
        }
        Ok(())
    }

    pub fn recording_disabled(&self) -> bool {
        self.recording_disabled
    }

    /// Flush and commit any still-staged frames unconditionally; used at
    /// session teardown.
    pub fn finish(mut self) -> Result<(), CoreError> {
        let frames: Vec<u64> = self.staged.keys().copied().collect();
        self.commit_frames(frames)?;
        self.writer
            .flush()
            .map_err(|e| CoreError::ReplayIo(e.to_string()))?;
        Ok(())
    }
}

/// A decoded playback slot: up to one raw word per port, plus presence.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaySlot {
    pub raws: [u32; PORTS],
    pub present: [bool; PORTS],
}

/// Read-side: a frame-indexed in-memory index of a replay log, built by a
/// single pass over the file.
pub struct ReplayReader {
    frames: Vec<u64>,
    slots: BTreeMap<u64, ReplaySlot>,
    last_index: std::cell::Cell<usize>,
}

impl ReplayReader {
    /// Scan `bytes` once, building the frame index. A short trailing read
    /// that doesn't form a complete record is treated as end-of-stream
    /// (logged, not an error). Invalid port indices are skipped with a
    /// warning; non-monotonic frame indices are a warning and discarded.
    pub fn scan(bytes: &[u8]) -> Self {
        let mut slots: BTreeMap<u64, ReplaySlot> = BTreeMap::new();
        let mut last_frame_seen: u64 = 0;
        let mut first = true;

        let mut offset = 0usize;
        while offset + RECORD_LEN <= bytes.len() {
            let buf: [u8; RECORD_LEN] = bytes[offset..offset + RECORD_LEN].try_into().unwrap();
            let record = ReplayRecord::decode(&buf);
            offset += RECORD_LEN;

            if !(0..PORTS as i32).contains(&record.port) {
                warn!(port = record.port, "replay log: invalid port index, skipping");
                continue;
            }
            if !first && record.frame < last_frame_seen {
                warn!(
                    frame = record.frame,
                    last_frame_seen, "replay log: non-monotonic frame index, discarding"
                );
                continue;
            }
            first = false;
            last_frame_seen = last_frame_seen.max(record.frame);

            let slot = slots.entry(record.frame).or_default();
            slot.raws[record.port as usize] = record.raw;
            slot.present[record.port as usize] = true;
        }

        if offset != bytes.len() {
            warn!(
                remaining = bytes.len() - offset,
                "replay log: short trailing record, treating as end-of-stream"
            );
        }

        let frames: Vec<u64> = slots.keys().copied().collect();
        Self {
            frames,
            slots,
            last_index: std::cell::Cell::new(0),
        }
    }

    /// Look up the slot for `frame`, with a one-step "last index" cache
    /// since most accesses are sequential.
    pub fn get(&self, frame: u64) -> Option<&ReplaySlot> {
        let last = self.last_index.get();
        if let Some(&f) = self.frames.get(last) {
            if f == frame {
                return self.slots.get(&frame);
            }
        }
        match self.frames.binary_search(&frame) {
            Ok(idx) => {
                self.last_index.set(idx);
                self.slots.get(&frame)
            }
            Err(_) => None,
        }
    }

    /// Raw value for (frame, port) with the Start/Pause bit masked off, as
    /// required on the playback consumption path.
    pub fn raw_for_playback(&self, frame: u64, port: u8) -> u32 {
        let Some(slot) = self.get(frame) else {
            return 0;
        };
        let Some(&raw) = slot.raws.get(port as usize) else {
            return 0;
        };
        if !slot.present.get(port as usize).copied().unwrap_or(false) {
            return 0;
        }
        input_word::mask_start_pause(raw)
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn record_round_trips() {
        let record = ReplayRecord {
            port: 2,
            frame: 1234,
            raw: 0xDEAD_BEEF,
        };
        let decoded = ReplayRecord::decode(&record.encode());
        assert_eq!(decoded, record);
    }

    #[test]
    fn record_is_exactly_16_bytes() {
        assert_eq!(RECORD_LEN, 16);
        let record = ReplayRecord {
            port: 0,
            frame: 0,
            raw: 0,
        };
        assert_eq!(record.encode().len(), 16);
    }

    #[test]
    fn local_record_replay_scenario_produces_480_records() {
        let buf = Cursor::new(Vec::new());
        let mut writer = ReplayWriter::new(buf);

        for frame in 0u64..120 {
            let mut raws = [0u32; PORTS];
            if frame == 30 {
                raws[0] = 0x0000_8000;
            }
            if frame == 90 {
                raws[0] = 0x0000_4000;
            }
            writer.stage_frame(frame, raws);
            writer.advance(frame).unwrap();
        }
        let bytes = writer.finish_to_bytes();

        assert_eq!(bytes.len() / RECORD_LEN, 480);

        let off30 = 30 * PORTS * RECORD_LEN;
        let off90 = 90 * PORTS * RECORD_LEN;
        let rec30 = ReplayRecord::decode(&bytes[off30..off30 + RECORD_LEN].try_into().unwrap());
        let rec90 = ReplayRecord::decode(&bytes[off90..off90 + RECORD_LEN].try_into().unwrap());
        assert_eq!(rec30.raw, 0x0000_8000);
        assert_eq!(rec90.raw, 0x0000_4000);
    }

    #[test]
    fn playback_masks_start_pause_bit() {
        let mut record_bytes = Vec::new();
        record_bytes.extend_from_slice(
            &ReplayRecord {
                port: 0,
                frame: 5,
                raw: 0x0000_0010,
            }
            .encode(),
        );
        let reader = ReplayReader::scan(&record_bytes);
        assert_eq!(reader.raw_for_playback(5, 0), 0x0000_0000);
    }

    #[test]
    fn non_monotonic_frame_is_discarded() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ReplayRecord { port: 0, frame: 10, raw: 1 }.encode());
        bytes.extend_from_slice(&ReplayRecord { port: 0, frame: 3, raw: 2 }.encode());
        let reader = ReplayReader::scan(&bytes);
        assert_eq!(reader.get(10).unwrap().raws[0], 1);
        assert!(reader.get(3).is_none());
    }

    #[test]
    fn invalid_port_is_skipped() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&ReplayRecord { port: 7, frame: 0, raw: 1 }.encode());
        let reader = ReplayReader::scan(&bytes);
        assert_eq!(reader.frame_count(), 0);
    }

    #[test]
    fn short_trailing_record_is_treated_as_eof() {
        let mut bytes = ReplayRecord { port: 0, frame: 0, raw: 1 }.encode().to_vec();
        bytes.extend_from_slice(&[0u8; 5]);
        let reader = ReplayReader::scan(&bytes);
        assert_eq!(reader.frame_count(), 1);
    }

    #[test]
    fn writing_same_frame_twice_replaces_staged_value() {
        let buf = Cursor::new(Vec::new());
        let mut writer = ReplayWriter::new(buf);
        writer.stage_frame(0, [1, 0, 0, 0]);
        writer.retroactive_write(0, [2, 0, 0, 0]);
        let bytes = writer.finish_to_bytes();
        let rec = ReplayRecord::decode(&bytes[0..RECORD_LEN].try_into().unwrap());
        assert_eq!(rec.raw, 1, "retroactive_write must not clobber an already-staged frame");
    }
}

#[cfg(test)]
impl ReplayWriter<std::io::Cursor<Vec<u8>>> {
    fn finish_to_bytes(self) -> Vec<u8> {
        self.finish_inner().unwrap().into_inner()
    }

    fn finish_inner(mut self) -> Result<std::io::Cursor<Vec<u8>>, CoreError> {
        let frames: Vec<u64> = self.staged.keys().copied().collect();
        self.commit_frames(frames)?;
        self.writer
            .flush()
            .map_err(|e| CoreError::ReplayIo(e.to_string()))?;
        Ok(self.writer)
    }
}
