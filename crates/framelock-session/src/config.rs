//! CLI & config surface (§6): the options the host emulator's front-end
//! recognizes to start a recording, playback, or netplay session.

use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Parser, Clone)]
#[command(name = "framelock", about = "Deterministic input-sync core for N64 netplay")]
pub struct Config {
    /// Replay a previously recorded session instead of accepting live input.
    #[arg(long = "Playback")]
    pub playback: bool,

    /// Directory containing `inputs.bin` and `state.st`.
    #[arg(long = "PlaybackPath")]
    pub playback_path: Option<PathBuf>,

    /// Record this session's inputs to disk. `Replays` is accepted as an alias.
    #[arg(long = "Record", alias = "Replays")]
    pub record: bool,

    /// Directory to append recordings into. `ReplaysPath` is accepted as an alias.
    #[arg(long = "RecordPath", alias = "ReplaysPath")]
    pub record_path: Option<PathBuf>,

    /// Rendezvous broker address, e.g. `broker.example.com:6420`.
    #[arg(long)]
    pub relay_host: Option<String>,

    /// Opaque session token handed to the rendezvous broker.
    #[arg(long)]
    pub token: Option<String>,

    /// Whether this peer is the session host (owns registration and settings).
    #[arg(long)]
    pub is_host: Option<bool>,

    /// Buffer-target delay Δ in frames (1-6).
    #[arg(long, default_value_t = 1)]
    pub buffer_target: u64,

    /// State ring depth (4-16).
    #[arg(long, default_value_t = framelock_core::state_ring::DEFAULT_DEPTH)]
    pub state_ring_depth: usize,
}

impl Config {
    /// Netplay start requires all three of `relay_host`, `token`, `is_host`.
    pub fn netplay_params(&self) -> Option<(&str, &str, bool)> {
        match (&self.relay_host, &self.token, self.is_host) {
            (Some(host), Some(token), Some(is_host)) => Some((host, token, is_host)),
            _ => None,
        }
    }

    /// Timestamp-based sub-path for a recording directory, local time,
    /// `{remix|vanilla}/YYYY-MM-DDTHH.MM.SS`.
    pub fn replay_subpath(variant: &str, local_time: &str) -> PathBuf {
        PathBuf::from(variant).join(local_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netplay_params_require_all_three() {
        let mut cfg = Config::parse_from(["framelock"]);
        assert!(cfg.netplay_params().is_none());

        cfg.relay_host = Some("broker:6420".into());
        cfg.token = Some("abcd".into());
        assert!(cfg.netplay_params().is_none());

        cfg.is_host = Some(true);
        assert_eq!(
            cfg.netplay_params(),
            Some(("broker:6420", "abcd", true))
        );
    }

    #[test]
    fn record_path_alias_accepted() {
        let cfg = Config::parse_from(["framelock", "--ReplaysPath", "./replays"]);
        assert_eq!(cfg.record_path, Some(PathBuf::from("./replays")));
    }
}
