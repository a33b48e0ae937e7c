//! Resource-telemetry aggregation engine
//!
//! This crate provides the shared machinery cost-optimization runbooks
//! use to collect time-series metrics across large cloud fleets:
//! - Pluggable discovery (bulk graph index with enumerated fallback)
//! - Bounded parallel metric collection with a per-scan result cache
//! - Full, quick, and statistically sampled scan strategies
//! - Deadline handling with partial-result tolerance

pub mod cache;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pool;
pub mod sampler;
pub mod scan;

pub use cache::MetricsCache;
pub use config::EngineSettings;
pub use discovery::{
    BackendSelector, BulkDiscovery, DiscoveryProvider, EnumeratedDiscovery, GraphQuery,
    RawResource, ScanScope, ScopeLister,
};
pub use error::{DiscoveryError, ScanError};
pub use metrics::{KindEstimates, MetricProvider};
pub use models::*;
pub use pool::{DrainOutcome, WorkerPool, DEFAULT_WORKER_CEILING};
pub use sampler::{SampleSelection, Sampler};
pub use scan::{ScanConfig, Scanner, DEFAULT_DRAIN_GRACE, DEFAULT_SAMPLE_SIZE};
