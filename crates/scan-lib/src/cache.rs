//! Per-scan metrics cache
//!
//! Shared between the orchestrator and the worker pool: workers write
//! results as they arrive, keyed by resource identity, and the
//! orchestrator reads only after the pool has drained. Writes to the
//! same key are last-write-wins, which makes re-submission of a
//! resource harmless.

use crate::models::MetricSampleSet;
use dashmap::DashMap;
use std::collections::BTreeMap;

/// Scan-scoped cache of sample sets keyed by resource id
#[derive(Debug, Default)]
pub struct MetricsCache {
    entries: DashMap<String, MetricSampleSet>,
}

impl MetricsCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Store a sample set under the given resource identity
    pub fn put(&self, resource_id: impl Into<String>, sample: MetricSampleSet) {
        self.entries.insert(resource_id.into(), sample);
    }

    pub fn get(&self, resource_id: &str) -> Option<MetricSampleSet> {
        self.entries.get(resource_id).map(|r| r.clone())
    }

    pub fn contains(&self, resource_id: &str) -> bool {
        self.entries.contains_key(resource_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the cache contents into an ordered map for the scan result
    pub fn snapshot(&self) -> BTreeMap<String, MetricSampleSet> {
        self.entries
            .iter()
            .map(|r| (r.key().clone(), r.value().clone()))
            .collect()
    }
}
