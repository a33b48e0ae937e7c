//! Replay providers backed by JSON fixture files
//!
//! Runbook authors develop and debug checks offline against recorded
//! inventories and metric series instead of live cloud backends. The
//! inventory file doubles as both discovery backends; a
//! `bulk_available: false` flag in the fixture exercises the
//! enumerated fallback path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use scan_lib::{
    DiscoveryError, GraphQuery, MetricPoint, MetricProvider, MetricSampleSet, MetricSpec,
    RawResource, ResourceDescriptor, ResourceKind, SampleError, ScanScope, ScopeLister,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

fn default_true() -> bool {
    true
}

/// On-disk inventory format
#[derive(Debug, Deserialize)]
pub struct InventoryFile {
    /// Whether the fixture should behave as if the bulk index exists
    #[serde(default = "default_true")]
    pub bulk_available: bool,
    pub resources: Vec<RawResource>,
}

/// Discovery backends replaying a recorded inventory
pub struct ReplayInventory {
    file: InventoryFile,
}

impl ReplayInventory {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory file {}", path.display()))?;
        let file: InventoryFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inventory file {}", path.display()))?;
        Ok(Self { file })
    }

    /// Distinct subscription ids, in first-seen order
    pub fn subscriptions(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for resource in &self.file.resources {
            if !seen.contains(&resource.subscription_id) {
                seen.push(resource.subscription_id.clone());
            }
        }
        seen
    }
}

#[async_trait]
impl GraphQuery for ReplayInventory {
    async fn query(
        &self,
        _scope: &ScanScope,
        skip: usize,
        top: usize,
    ) -> Result<Vec<RawResource>, DiscoveryError> {
        if !self.file.bulk_available {
            return Err(DiscoveryError::Unavailable(
                "inventory fixture marks bulk backend unavailable".to_string(),
            ));
        }
        Ok(self
            .file
            .resources
            .iter()
            .skip(skip)
            .take(top)
            .cloned()
            .collect())
    }

    async fn available(&self) -> bool {
        self.file.bulk_available
    }
}

#[async_trait]
impl ScopeLister for ReplayInventory {
    async fn list(
        &self,
        subscription_id: &str,
        kinds: &[ResourceKind],
    ) -> Result<Vec<RawResource>, DiscoveryError> {
        Ok(self
            .file
            .resources
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .filter(|r| kinds.is_empty() || kinds.contains(&ResourceKind::from_label(&r.kind)))
            .cloned()
            .collect())
    }
}

/// On-disk recordings format: resource id -> metric name -> points
#[derive(Debug, Default, Deserialize)]
pub struct RecordingsFile {
    pub series: HashMap<String, BTreeMap<String, Vec<MetricPoint>>>,
}

/// Metric provider replaying recorded series
///
/// Resources without a recording get an error payload, which is how
/// the live backends report unreachable resources too.
pub struct ReplayMetrics {
    recordings: RecordingsFile,
}

impl ReplayMetrics {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read recordings file {}", path.display()))?;
        let recordings: RecordingsFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse recordings file {}", path.display()))?;
        Ok(Self { recordings })
    }

    /// Provider with no recordings at all; every fetch errors
    pub fn empty() -> Self {
        Self {
            recordings: RecordingsFile::default(),
        }
    }
}

#[async_trait]
impl MetricProvider for ReplayMetrics {
    async fn fetch(&self, resource: &ResourceDescriptor, spec: &MetricSpec) -> MetricSampleSet {
        let recorded = match self.recordings.series.get(&resource.id) {
            Some(recorded) => recorded,
            None => {
                return MetricSampleSet::failed(
                    resource.id.clone(),
                    SampleError::Fetch("no recorded series for resource".to_string()),
                );
            }
        };

        let series: BTreeMap<String, Vec<MetricPoint>> = spec
            .names
            .iter()
            .filter_map(|name| recorded.get(name).map(|points| (name.clone(), points.clone())))
            .collect();

        if series.is_empty() {
            return MetricSampleSet::failed(resource.id.clone(), SampleError::NoData);
        }

        MetricSampleSet::measured(resource.id.clone(), series)
    }
}
