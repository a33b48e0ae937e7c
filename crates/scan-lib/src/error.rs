//! Error taxonomy for the scan engine
//!
//! Only two failure classes abort a whole scan: a fatal discovery error
//! and a worker-pool infrastructure failure. Everything else is absorbed
//! into individual sample sets as data (see `models::SampleError`).

use thiserror::Error;

/// Failures reported by a discovery backend
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The backend is not installed or not reachable. Not fatal in auto
    /// mode: the orchestrator retries with the enumerated backend.
    #[error("discovery backend unavailable: {0}")]
    Unavailable(String),

    /// Malformed scope, permission denied, or another caller-side
    /// problem. Fatal: retrying with a different backend cannot help.
    #[error("discovery failed: {0}")]
    Failed(String),
}

/// Fatal scan-level failures
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("invalid scan configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("worker pool failure: {0}")]
    PoolInfrastructure(String),
}
