use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid port index: {0}")]
    InvalidPort(u8),
    #[error("rollback beyond state ring depth: frames_back={frames_back}, depth={depth}")]
    RollbackBoundExceeded { frames_back: u64, depth: usize },
    #[error("state ring load failed for frames_back={0}")]
    StateLoadFailed(u64),
    #[error("host error: {0}")]
    Host(#[from] framelock_host::HostError),
    #[error("replay log I/O error: {0}")]
    ReplayIo(String),
    #[error("replay record malformed")]
    ReplayMalformed,
}

/// Small non-exception outcome enumeration for the emulator-facing session
/// APIs (§6): callers that don't want `Result`-style propagation across the
/// vblank boundary can match on this instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    NotInitialized,
    InvalidState,
    InvalidInput,
    SystemFail,
}
