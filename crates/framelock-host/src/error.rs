use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("address out of range: {0:#010x}")]
    AddressOutOfRange(u32),
    #[error("save-state buffer size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },
    #[error("save-state serialization failed: {0}")]
    SerializationFailed(String),
    #[error("no pending async save job")]
    NoPendingJob,
}
