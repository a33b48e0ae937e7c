//! Engine configuration from the environment
//!
//! Runbooks configure scans through `FLEETSCAN_*` environment
//! variables; anything not set falls back to engine defaults.

use crate::error::ScanError;
use crate::models::{BackendPreference, ScanMode};
use crate::pool::DEFAULT_WORKER_CEILING;
use crate::scan::{ScanConfig, DEFAULT_DRAIN_GRACE, DEFAULT_SAMPLE_SIZE};
use serde::Deserialize;
use std::time::Duration;

/// Environment-shaped scan settings
#[derive(Debug, Clone, Deserialize)]
pub struct EngineSettings {
    /// Scan mode: full | quick | sample
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Worker pool concurrency ceiling
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Subset size for sample mode
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Backend preference: auto | bulk-only | enumerated-only
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Whole-scan time budget in seconds, unbounded if unset
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    /// Grace period past the deadline for in-flight work, in seconds
    #[serde(default = "default_drain_grace_secs")]
    pub drain_grace_secs: u64,

    /// Sampler seed for reproducible runs, entropy if unset
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_mode() -> String {
    "full".to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKER_CEILING
}

fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

fn default_backend() -> String {
    "auto".to_string()
}

fn default_drain_grace_secs() -> u64 {
    DEFAULT_DRAIN_GRACE.as_secs()
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            workers: default_workers(),
            sample_size: default_sample_size(),
            backend: default_backend(),
            timeout_secs: None,
            drain_grace_secs: default_drain_grace_secs(),
            seed: None,
        }
    }
}

impl EngineSettings {
    /// Load settings from `FLEETSCAN_*` environment variables
    pub fn load() -> Result<Self, ScanError> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("FLEETSCAN").try_parsing(true))
            .build()
            .map_err(|e| ScanError::InvalidConfig(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| ScanError::InvalidConfig(e.to_string()))
    }

    /// Resolve the string-typed fields into a validated scan config
    pub fn into_scan_config(self) -> Result<ScanConfig, ScanError> {
        let mode: ScanMode = self.mode.parse().map_err(ScanError::InvalidConfig)?;
        let backend: BackendPreference =
            self.backend.parse().map_err(ScanError::InvalidConfig)?;

        Ok(ScanConfig {
            mode,
            worker_ceiling: self.workers,
            sample_size: self.sample_size,
            backend,
            deadline: self.timeout_secs.map(Duration::from_secs),
            drain_grace: Duration::from_secs(self.drain_grace_secs),
            seed: self.seed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_resolve() {
        let config = EngineSettings::default().into_scan_config().unwrap();
        assert_eq!(config.mode, ScanMode::Full);
        assert_eq!(config.worker_ceiling, DEFAULT_WORKER_CEILING);
        assert_eq!(config.sample_size, DEFAULT_SAMPLE_SIZE);
        assert_eq!(config.backend, BackendPreference::Auto);
        assert!(config.deadline.is_none());
        assert_eq!(config.drain_grace, DEFAULT_DRAIN_GRACE);
    }

    #[test]
    fn test_mode_and_backend_resolution() {
        let settings = EngineSettings {
            mode: "sample".to_string(),
            backend: "enumerated-only".to_string(),
            timeout_secs: Some(120),
            ..Default::default()
        };

        let config = settings.into_scan_config().unwrap();
        assert_eq!(config.mode, ScanMode::Sample);
        assert_eq!(config.backend, BackendPreference::EnumeratedOnly);
        assert_eq!(config.deadline, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_bad_mode_rejected() {
        let settings = EngineSettings {
            mode: "thorough".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            settings.into_scan_config(),
            Err(ScanError::InvalidConfig(_))
        ));
    }
}
