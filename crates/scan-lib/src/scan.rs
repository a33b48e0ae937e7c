//! Scan orchestration
//!
//! Drives one scan end to end: discovery, mode resolution, bounded
//! parallel metric collection, and result assembly. The run moves
//! through an explicit phase sequence
//! (discovering -> synthesizing | sampling -> measuring -> aggregating)
//! and only discovery exhaustion or a pool infrastructure failure can
//! abort it; every per-resource problem degrades the result instead.

use crate::cache::MetricsCache;
use crate::discovery::{BackendSelector, ScanScope};
use crate::error::ScanError;
use crate::metrics::{KindEstimates, MetricProvider};
use crate::models::{
    BackendPreference, MetricSampleSet, MetricSpec, ResourceDescriptor, SampleError, ScanMode,
    ScanResult,
};
use crate::pool::{WorkerPool, DEFAULT_WORKER_CEILING};
use crate::sampler::Sampler;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default sample size for sample-mode scans
pub const DEFAULT_SAMPLE_SIZE: usize = 50;

/// Default grace period granted to in-flight work past the deadline
pub const DEFAULT_DRAIN_GRACE: Duration = Duration::from_secs(30);

/// Caller configuration for one scan
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub mode: ScanMode,
    /// Concurrency ceiling for metric collection
    pub worker_ceiling: usize,
    /// Subset size for sample mode
    pub sample_size: usize,
    pub backend: BackendPreference,
    /// Whole-scan time budget; None means unbounded
    pub deadline: Option<Duration>,
    /// How long in-flight work may run past the deadline
    pub drain_grace: Duration,
    /// Sampler seed; None draws from entropy
    pub seed: Option<u64>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            mode: ScanMode::Full,
            worker_ceiling: DEFAULT_WORKER_CEILING,
            sample_size: DEFAULT_SAMPLE_SIZE,
            backend: BackendPreference::Auto,
            deadline: None,
            drain_grace: DEFAULT_DRAIN_GRACE,
            seed: None,
        }
    }
}

impl ScanConfig {
    fn validate(&self) -> Result<(), ScanError> {
        if self.worker_ceiling == 0 {
            return Err(ScanError::InvalidConfig(
                "worker ceiling must be positive".to_string(),
            ));
        }
        if self.mode == ScanMode::Sample && self.sample_size == 0 {
            return Err(ScanError::InvalidConfig(
                "sample size must be positive in sample mode".to_string(),
            ));
        }
        Ok(())
    }
}

/// Phases of one orchestrator run, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanPhase {
    Idle,
    Discovering,
    Synthesizing,
    Sampling,
    Measuring,
    Aggregating,
    Done,
    Failed,
}

fn enter(phase: &mut ScanPhase, next: ScanPhase) {
    debug!(from = ?phase, to = ?next, "Scan phase transition");
    *phase = next;
}

/// Top-level scan coordinator
pub struct Scanner {
    selector: BackendSelector,
    metrics: Arc<dyn MetricProvider>,
    estimates: KindEstimates,
    config: ScanConfig,
}

impl Scanner {
    pub fn new(
        selector: BackendSelector,
        metrics: Arc<dyn MetricProvider>,
        config: ScanConfig,
    ) -> Self {
        Self {
            selector,
            metrics,
            estimates: KindEstimates::default(),
            config,
        }
    }

    /// Replace the quick-mode estimate table
    pub fn with_estimates(mut self, estimates: KindEstimates) -> Self {
        self.estimates = estimates;
        self
    }

    /// Run one scan over the given scope.
    ///
    /// Always returns either a complete result (possibly with errored
    /// per-resource entries) or a fatal error explaining why discovery
    /// or the pool could not proceed at all.
    pub async fn run(&self, scope: &ScanScope, spec: &MetricSpec) -> Result<ScanResult, ScanError> {
        self.config.validate()?;
        spec.validate().map_err(ScanError::InvalidConfig)?;

        let started_at = Utc::now();
        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut phase = ScanPhase::Idle;

        enter(&mut phase, ScanPhase::Discovering);
        let (resources, backend_used) = match self.selector.discover(scope).await {
            Ok(found) => found,
            Err(e) => {
                enter(&mut phase, ScanPhase::Failed);
                return Err(e);
            }
        };
        info!(
            discovered = resources.len(),
            backend = %backend_used,
            mode = %self.config.mode,
            "Discovery complete"
        );

        let cache = Arc::new(MetricsCache::new());
        let total_discovered = resources.len();

        let (measured, factor) = match self.config.mode {
            ScanMode::Quick => {
                enter(&mut phase, ScanPhase::Synthesizing);
                for resource in &resources {
                    cache.put(resource.id.clone(), self.estimates.synthesize(resource, spec));
                }
                (0, 1.0)
            }
            ScanMode::Sample => {
                enter(&mut phase, ScanPhase::Sampling);
                let mut sampler = match self.config.seed {
                    Some(seed) => Sampler::seeded(seed),
                    None => Sampler::from_entropy(),
                };
                let selection = sampler.select(&resources, self.config.sample_size);

                enter(&mut phase, ScanPhase::Measuring);
                let measured = self
                    .measure(&selection.selected, spec, cache.clone(), deadline)
                    .await?;
                (measured, selection.extrapolation_factor)
            }
            ScanMode::Full => {
                enter(&mut phase, ScanPhase::Measuring);
                let measured = self.measure(&resources, spec, cache.clone(), deadline).await?;
                (measured, 1.0)
            }
        };

        enter(&mut phase, ScanPhase::Aggregating);
        let per_resource = cache.snapshot();
        let result = ScanResult {
            mode: self.config.mode,
            total_resources_discovered: total_discovered,
            resources_measured: measured,
            extrapolation_factor: factor,
            per_resource,
            discovery_backend_used: backend_used,
            started_at,
            finished_at: Utc::now(),
        };

        enter(&mut phase, ScanPhase::Done);
        info!(
            discovered = result.total_resources_discovered,
            measured = result.resources_measured,
            ok = result.measured_ok(),
            errored = result.errored_resources().len(),
            factor = result.extrapolation_factor,
            "Scan complete"
        );

        Ok(result)
    }

    /// Drive the worker pool over the target set.
    ///
    /// Returns the number of targeted resources. Targets that miss the
    /// deadline, either before submission or while in flight past the
    /// grace period, end up in the cache as `Cancelled` entries.
    async fn measure(
        &self,
        targets: &[ResourceDescriptor],
        spec: &MetricSpec,
        cache: Arc<MetricsCache>,
        deadline: Option<Instant>,
    ) -> Result<usize, ScanError> {
        let mut pool = WorkerPool::new(self.config.worker_ceiling)?;
        let spec = Arc::new(spec.clone());

        for resource in targets {
            if let Some(stop) = deadline {
                if Instant::now() >= stop {
                    warn!(resource_id = %resource.id, "Deadline expired, not submitting");
                    cache.put(
                        resource.id.clone(),
                        MetricSampleSet::failed(resource.id.clone(), SampleError::Cancelled),
                    );
                    continue;
                }
            }

            let provider = self.metrics.clone();
            let cache = cache.clone();
            let spec = spec.clone();
            let resource = resource.clone();

            pool.submit(async move {
                let sample = provider.fetch(&resource, &spec).await;
                // Route by identity so re-submission stays idempotent
                cache.put(resource.id.clone(), sample);
            })
            .await?;
        }

        let hard_stop = deadline.map(|d| d + self.config.drain_grace);
        let outcome = pool.drain(hard_stop).await;
        if outcome.timed_out {
            warn!(
                completed = outcome.completed,
                "Drain timed out, marking unfinished resources cancelled"
            );
        }

        // Anything submitted but absent from the cache was cut off
        for resource in targets {
            if !cache.contains(&resource.id) {
                cache.put(
                    resource.id.clone(),
                    MetricSampleSet::failed(resource.id.clone(), SampleError::Cancelled),
                );
            }
        }

        Ok(targets.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{
        BulkDiscovery, EnumeratedDiscovery, GraphQuery, RawResource, ScopeLister,
    };
    use crate::error::DiscoveryError;
    use crate::models::{Aggregation, DiscoveryBackend, ResourceKind, SampleOrigin};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Graph index over a fixed fleet, optionally unavailable
    struct FakeIndex {
        total: usize,
        available: bool,
    }

    #[async_trait]
    impl GraphQuery for FakeIndex {
        async fn query(
            &self,
            _scope: &ScanScope,
            skip: usize,
            top: usize,
        ) -> Result<Vec<RawResource>, DiscoveryError> {
            if !self.available {
                return Err(DiscoveryError::Unavailable("extension missing".to_string()));
            }
            let end = (skip + top).min(self.total);
            Ok((skip..end).map(|i| raw(i)).collect())
        }

        async fn available(&self) -> bool {
            self.available
        }
    }

    struct FakeLister {
        total: usize,
    }

    #[async_trait]
    impl ScopeLister for FakeLister {
        async fn list(
            &self,
            _subscription_id: &str,
            _kinds: &[ResourceKind],
        ) -> Result<Vec<RawResource>, DiscoveryError> {
            Ok((0..self.total).map(raw).collect())
        }
    }

    fn raw(i: usize) -> RawResource {
        RawResource {
            id: format!("res-{:04}", i),
            name: format!("vm-{}", i),
            kind: "VirtualMachine".to_string(),
            location: "westeurope".to_string(),
            subscription_id: "sub-1".to_string(),
            resource_group: "rg-1".to_string(),
        }
    }

    /// Metric provider that records its concurrent-call high-water mark
    struct InstrumentedProvider {
        current: AtomicUsize,
        high_water: AtomicUsize,
        calls: AtomicUsize,
        fail_all: bool,
        delay: Duration,
    }

    impl InstrumentedProvider {
        fn ok() -> Self {
            Self {
                current: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_all: false,
                delay: Duration::from_millis(5),
            }
        }

        fn failing() -> Self {
            Self {
                fail_all: true,
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl MetricProvider for InstrumentedProvider {
        async fn fetch(
            &self,
            resource: &ResourceDescriptor,
            spec: &MetricSpec,
        ) -> MetricSampleSet {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;
            self.current.fetch_sub(1, Ordering::SeqCst);

            if self.fail_all {
                return MetricSampleSet::failed(
                    resource.id.clone(),
                    SampleError::Fetch("backend says no".to_string()),
                );
            }

            let series: BTreeMap<_, _> = spec
                .names
                .iter()
                .map(|name| {
                    (
                        name.clone(),
                        vec![crate::models::MetricPoint {
                            timestamp: Utc::now(),
                            value: 42.0,
                        }],
                    )
                })
                .collect();
            MetricSampleSet::measured(resource.id.clone(), series)
        }
    }

    fn scanner_over(
        fleet: usize,
        bulk_available: bool,
        provider: Arc<InstrumentedProvider>,
        config: ScanConfig,
    ) -> Scanner {
        let selector = BackendSelector::new(
            Arc::new(BulkDiscovery::new(Arc::new(FakeIndex {
                total: fleet,
                available: bulk_available,
            }))),
            Arc::new(EnumeratedDiscovery::new(Arc::new(FakeLister {
                total: fleet,
            }))),
            config.backend,
        );
        Scanner::new(selector, provider, config)
    }

    fn scope() -> ScanScope {
        ScanScope {
            subscriptions: vec!["sub-1".to_string()],
            kinds: vec![],
        }
    }

    fn spec() -> MetricSpec {
        MetricSpec {
            names: vec!["Percentage CPU".to_string()],
            lookback_days: 7,
            aggregations: vec![Aggregation::Average],
            interval_hint: Duration::from_secs(3600),
        }
    }

    #[tokio::test]
    async fn test_full_scan_measures_everything_within_ceiling() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            worker_ceiling: 2,
            ..Default::default()
        };
        let scanner = scanner_over(5, true, provider.clone(), config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.total_resources_discovered, 5);
        assert_eq!(result.resources_measured, 5);
        assert_eq!(result.per_resource.len(), 5);
        assert_eq!(result.extrapolation_factor, 1.0);
        assert_eq!(result.discovery_backend_used, DiscoveryBackend::Bulk);
        assert!(provider.high_water.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_quick_scan_issues_no_metric_calls() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            mode: ScanMode::Quick,
            ..Default::default()
        };
        let scanner = scanner_over(8, true, provider.clone(), config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.total_resources_discovered, 8);
        assert_eq!(result.resources_measured, 0);
        assert_eq!(result.per_resource.len(), 8);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert!(result
            .per_resource
            .values()
            .all(|s| s.origin == SampleOrigin::Estimated && !s.is_err()));
    }

    #[tokio::test]
    async fn test_sample_scan_extrapolation() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            mode: ScanMode::Sample,
            sample_size: 20,
            worker_ceiling: 10,
            seed: Some(7),
            ..Default::default()
        };
        let scanner = scanner_over(1000, true, provider.clone(), config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.total_resources_discovered, 1000);
        assert_eq!(result.resources_measured, 20);
        assert_eq!(result.per_resource.len(), 20);
        assert_eq!(result.extrapolation_factor, 50.0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 20);
    }

    #[tokio::test]
    async fn test_sample_mode_small_fleet_degrades_to_full() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            mode: ScanMode::Sample,
            sample_size: 20,
            seed: Some(7),
            ..Default::default()
        };
        let scanner = scanner_over(4, true, provider, config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();
        assert_eq!(result.resources_measured, 4);
        assert_eq!(result.extrapolation_factor, 1.0);
    }

    #[tokio::test]
    async fn test_bulk_unavailable_falls_back_to_enumerated() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let scanner = scanner_over(6, false, provider, ScanConfig::default());

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.discovery_backend_used, DiscoveryBackend::Enumerated);
        assert_eq!(result.total_resources_discovered, 6);
        assert_eq!(result.resources_measured, 6);
    }

    #[tokio::test]
    async fn test_zero_resources_reaches_done() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let scanner = scanner_over(0, true, provider, ScanConfig::default());

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.total_resources_discovered, 0);
        assert_eq!(result.resources_measured, 0);
        assert!(result.per_resource.is_empty());
    }

    #[tokio::test]
    async fn test_all_fetches_failing_still_completes() {
        let provider = Arc::new(InstrumentedProvider::failing());
        let scanner = scanner_over(5, true, provider, ScanConfig::default());

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.resources_measured, 5);
        assert_eq!(result.per_resource.len(), 5);
        assert!(result.per_resource.values().all(|s| s.is_err()));
        assert_eq!(result.measured_ok(), 0);
        assert_eq!(result.errored_resources().len(), 5);
    }

    #[tokio::test]
    async fn test_expired_deadline_marks_everything_cancelled() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            deadline: Some(Duration::ZERO),
            drain_grace: Duration::from_millis(10),
            ..Default::default()
        };
        let scanner = scanner_over(4, true, provider.clone(), config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        assert_eq!(result.per_resource.len(), 4);
        assert!(result
            .per_resource
            .values()
            .all(|s| s.error == Some(SampleError::Cancelled)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_measured_is_subset_of_discovered() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            mode: ScanMode::Sample,
            sample_size: 3,
            seed: Some(1),
            ..Default::default()
        };
        let scanner = scanner_over(10, true, provider, config);

        let result = scanner.run(&scope(), &spec()).await.unwrap();

        for id in result.per_resource.keys() {
            assert!(id.starts_with("res-"));
        }
        assert_eq!(result.per_resource.len(), 3);
        assert_eq!(result.resources_measured, 3);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let config = ScanConfig {
            worker_ceiling: 0,
            ..Default::default()
        };
        let scanner = scanner_over(3, true, provider, config);

        let err = scanner.run(&scope(), &spec()).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_invalid_metric_spec_rejected() {
        let provider = Arc::new(InstrumentedProvider::ok());
        let scanner = scanner_over(3, true, provider, ScanConfig::default());

        let mut bad_spec = spec();
        bad_spec.lookback_days = 0;

        let err = scanner.run(&scope(), &bad_spec).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }
}
