use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("core error: {0}")]
    Core(#[from] framelock_core::CoreError),
    #[error("host error: {0}")]
    Host(#[from] framelock_host::HostError),
    #[error("network error: {0}")]
    Net(#[from] framelock_net::NetError),
    #[error("rendezvous error: {0}")]
    Rendezvous(#[from] framelock_net::RendezvousError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("setup call timed out after {0:?}")]
    SetupTimeout(Duration),
    #[error("netplay start requires relay_host, token, and is_host")]
    IncompleteNetplayConfig,
    #[error("session is not initialized for this call")]
    NotInitialized,
}
