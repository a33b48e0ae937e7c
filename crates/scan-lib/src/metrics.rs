//! Metric collection seam and quick-mode estimates
//!
//! The metric provider contract is deliberately infallible: collecting
//! for thousands of resources must not let one bad resource abort the
//! batch, so every failure travels inside the returned sample set.

use crate::models::{
    MetricPoint, MetricSampleSet, MetricSpec, ResourceDescriptor, ResourceKind,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};

/// Trait for metric backend implementations
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Fetch the time series for one resource.
    ///
    /// Never fails at the signature level: backend errors, missing
    /// data, and timeouts are all encoded in the sample set's `error`
    /// field.
    async fn fetch(&self, resource: &ResourceDescriptor, spec: &MetricSpec) -> MetricSampleSet;
}

/// Static per-kind utilization estimates used by quick scans
///
/// Quick mode issues no metric calls at all; instead every discovered
/// resource gets a single synthesized data point per requested metric,
/// taken from this table. Values are coarse fleet-wide priors and
/// callers can override them per kind.
#[derive(Debug, Clone)]
pub struct KindEstimates {
    table: HashMap<ResourceKind, f64>,
    fallback: f64,
}

impl Default for KindEstimates {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(ResourceKind::VirtualMachine, 55.0);
        table.insert(ResourceKind::Cluster, 60.0);
        table.insert(ResourceKind::Disk, 40.0);
        table.insert(ResourceKind::StorageAccount, 35.0);
        table.insert(ResourceKind::ServicePlan, 50.0);
        table.insert(ResourceKind::Database, 45.0);
        table.insert(ResourceKind::PublicIp, 25.0);
        Self {
            table,
            fallback: 50.0,
        }
    }
}

impl KindEstimates {
    /// Override or add the estimate for one kind
    pub fn insert(&mut self, kind: ResourceKind, estimate: f64) {
        self.table.insert(kind, estimate);
    }

    pub fn estimate_for(&self, kind: ResourceKind) -> f64 {
        self.table.get(&kind).copied().unwrap_or(self.fallback)
    }

    /// Build a synthesized sample set for one resource, one point per
    /// requested metric name
    pub fn synthesize(&self, resource: &ResourceDescriptor, spec: &MetricSpec) -> MetricSampleSet {
        let value = self.estimate_for(resource.kind);
        let now = Utc::now();

        let series: BTreeMap<String, Vec<MetricPoint>> = spec
            .names
            .iter()
            .map(|name| {
                (
                    name.clone(),
                    vec![MetricPoint {
                        timestamp: now,
                        value,
                    }],
                )
            })
            .collect();

        MetricSampleSet::estimated(resource.id.clone(), series)
    }
}
