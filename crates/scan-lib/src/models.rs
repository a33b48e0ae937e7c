//! Core data models for the scan engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Category of a discovered cloud resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    VirtualMachine,
    Cluster,
    Disk,
    StorageAccount,
    ServicePlan,
    Database,
    PublicIp,
    /// Anything the discovery backend reports that we do not classify
    Other,
}

impl ResourceKind {
    /// Map a provider-reported kind label onto our taxonomy.
    /// Unrecognized labels fall back to `Other` rather than failing discovery.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "vm" | "virtualmachine" | "virtual-machine" => ResourceKind::VirtualMachine,
            "cluster" | "aks" | "kubernetes" => ResourceKind::Cluster,
            "disk" => ResourceKind::Disk,
            "storageaccount" | "storage-account" => ResourceKind::StorageAccount,
            "serviceplan" | "service-plan" | "appserviceplan" => ResourceKind::ServicePlan,
            "database" | "sql" => ResourceKind::Database,
            "publicip" | "public-ip" => ResourceKind::PublicIp,
            _ => ResourceKind::Other,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ResourceKind::VirtualMachine => "virtual-machine",
            ResourceKind::Cluster => "cluster",
            ResourceKind::Disk => "disk",
            ResourceKind::StorageAccount => "storage-account",
            ResourceKind::ServicePlan => "service-plan",
            ResourceKind::Database => "database",
            ResourceKind::PublicIp => "public-ip",
            ResourceKind::Other => "other",
        };
        write!(f, "{}", label)
    }
}

/// One discovered cloud resource
///
/// Created by a discovery backend, owned by the orchestrator for the
/// duration of a single scan, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Globally unique resource identifier
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub location: String,
    pub subscription_id: String,
    pub resource_group: String,
}

/// Time-series aggregation requested from the metrics backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Aggregation {
    Average,
    Maximum,
    Minimum,
    Sum,
}

/// What to collect for each resource, constant for a whole scan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Metric names to request (e.g. "Percentage CPU")
    pub names: Vec<String>,
    /// How far back to look, in days
    pub lookback_days: u32,
    pub aggregations: Vec<Aggregation>,
    /// Desired spacing between data points
    pub interval_hint: Duration,
}

impl MetricSpec {
    /// Reject specs the metrics backend could never serve
    pub fn validate(&self) -> Result<(), String> {
        if self.names.is_empty() {
            return Err("metric spec has no metric names".to_string());
        }
        if self.lookback_days == 0 {
            return Err("metric spec lookback must be at least one day".to_string());
        }
        Ok(())
    }
}

/// One point in a metric time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Terminal per-resource failure states
///
/// These are data, not control flow: a failed fetch is a valid entry in
/// the scan result, never a reason to abort the scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "kebab-case")]
pub enum SampleError {
    /// The metrics backend rejected or failed the fetch
    Fetch(String),
    /// The backend answered but had no data for the lookback window
    NoData,
    /// The scan deadline expired before this resource was measured
    Cancelled,
}

impl fmt::Display for SampleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Fetch(detail) => write!(f, "fetch failed: {}", detail),
            SampleError::NoData => write!(f, "no data in lookback window"),
            SampleError::Cancelled => write!(f, "cancelled before completion"),
        }
    }
}

/// Whether a sample set came from the metrics backend or from the
/// quick-mode per-kind estimate table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleOrigin {
    Measured,
    Estimated,
}

/// Result of metric collection for one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSampleSet {
    pub resource_id: String,
    /// Metric name -> chronologically ordered points
    pub series: BTreeMap<String, Vec<MetricPoint>>,
    pub fetched_at: DateTime<Utc>,
    pub origin: SampleOrigin,
    pub error: Option<SampleError>,
}

impl MetricSampleSet {
    /// A successfully measured sample set
    pub fn measured(
        resource_id: impl Into<String>,
        series: BTreeMap<String, Vec<MetricPoint>>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            series,
            fetched_at: Utc::now(),
            origin: SampleOrigin::Measured,
            error: None,
        }
    }

    /// A quick-mode synthesized sample set
    pub fn estimated(
        resource_id: impl Into<String>,
        series: BTreeMap<String, Vec<MetricPoint>>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            series,
            fetched_at: Utc::now(),
            origin: SampleOrigin::Estimated,
            error: None,
        }
    }

    /// A terminally failed sample set (still a valid result entry)
    pub fn failed(resource_id: impl Into<String>, error: SampleError) -> Self {
        Self {
            resource_id: resource_id.into(),
            series: BTreeMap::new(),
            fetched_at: Utc::now(),
            origin: SampleOrigin::Measured,
            error: Some(error),
        }
    }

    pub fn is_err(&self) -> bool {
        self.error.is_some()
    }
}

/// How much of the fleet gets real metric calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Every discovered resource gets a metrics call
    Full,
    /// No metrics calls; synthesized per-kind estimates only
    Quick,
    /// A bounded random subset gets metrics calls, with extrapolation
    Sample,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(ScanMode::Full),
            "quick" => Ok(ScanMode::Quick),
            "sample" => Ok(ScanMode::Sample),
            other => Err(format!(
                "unknown scan mode '{}' (expected full, quick or sample)",
                other
            )),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Full => write!(f, "full"),
            ScanMode::Quick => write!(f, "quick"),
            ScanMode::Sample => write!(f, "sample"),
        }
    }
}

/// Which discovery mechanism actually produced the resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiscoveryBackend {
    Bulk,
    Enumerated,
}

impl fmt::Display for DiscoveryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryBackend::Bulk => write!(f, "bulk"),
            DiscoveryBackend::Enumerated => write!(f, "enumerated"),
        }
    }
}

/// Caller preference for discovery backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendPreference {
    /// Try bulk first, fall back to enumerated if unavailable
    Auto,
    BulkOnly,
    EnumeratedOnly,
}

impl FromStr for BackendPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendPreference::Auto),
            "bulk-only" => Ok(BackendPreference::BulkOnly),
            "enumerated-only" => Ok(BackendPreference::EnumeratedOnly),
            other => Err(format!(
                "unknown backend preference '{}' (expected auto, bulk-only or enumerated-only)",
                other
            )),
        }
    }
}

/// Aggregated output of one scan
///
/// Handed to the caller at the end of a run and never touched again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub mode: ScanMode,
    pub total_resources_discovered: usize,
    /// Number of resources that were targeted by metrics calls
    pub resources_measured: usize,
    /// Multiplier for scaling sample-derived aggregates to the full fleet.
    /// Always 1.0 unless mode is `sample`.
    pub extrapolation_factor: f64,
    /// Resource id -> collected (or synthesized, or failed) sample set
    pub per_resource: BTreeMap<String, MetricSampleSet>,
    pub discovery_backend_used: DiscoveryBackend,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ScanResult {
    /// Ids of resources whose sample set carries an error payload
    pub fn errored_resources(&self) -> Vec<&str> {
        self.per_resource
            .values()
            .filter(|s| s.is_err())
            .map(|s| s.resource_id.as_str())
            .collect()
    }

    /// Number of sample sets collected without error
    pub fn measured_ok(&self) -> usize {
        self.per_resource
            .values()
            .filter(|s| !s.is_err() && s.origin == SampleOrigin::Measured)
            .count()
    }

    /// Wall-clock duration of the scan
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_mode_parsing() {
        assert_eq!("full".parse::<ScanMode>().unwrap(), ScanMode::Full);
        assert_eq!("QUICK".parse::<ScanMode>().unwrap(), ScanMode::Quick);
        assert_eq!("sample".parse::<ScanMode>().unwrap(), ScanMode::Sample);
        assert!("exhaustive".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_backend_preference_parsing() {
        assert_eq!(
            "auto".parse::<BackendPreference>().unwrap(),
            BackendPreference::Auto
        );
        assert_eq!(
            "bulk-only".parse::<BackendPreference>().unwrap(),
            BackendPreference::BulkOnly
        );
        assert!("graph".parse::<BackendPreference>().is_err());
    }

    #[test]
    fn test_kind_label_mapping() {
        assert_eq!(
            ResourceKind::from_label("VirtualMachine"),
            ResourceKind::VirtualMachine
        );
        assert_eq!(ResourceKind::from_label("disk"), ResourceKind::Disk);
        assert_eq!(
            ResourceKind::from_label("somethingelse"),
            ResourceKind::Other
        );
    }

    #[test]
    fn test_metric_spec_validation() {
        let spec = MetricSpec {
            names: vec!["Percentage CPU".to_string()],
            lookback_days: 7,
            aggregations: vec![Aggregation::Average],
            interval_hint: Duration::from_secs(3600),
        };
        assert!(spec.validate().is_ok());

        let mut bad = spec.clone();
        bad.lookback_days = 0;
        assert!(bad.validate().is_err());

        let mut empty = spec;
        empty.names.clear();
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_failed_sample_set_is_err() {
        let sample = MetricSampleSet::failed("res-1", SampleError::NoData);
        assert!(sample.is_err());
        assert!(sample.series.is_empty());
    }
}
