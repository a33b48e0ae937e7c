//! fleetscan - run one telemetry scan from the command line
//!
//! Wires replay (fixture) providers into the scan engine so runbook
//! authors can exercise cost-check logic offline. The scan result is
//! written to stdout as JSON; logs go to stderr.

mod replay;

use anyhow::{Context, Result};
use clap::Parser;
use scan_lib::{
    BackendPreference, BackendSelector, BulkDiscovery, EngineSettings, EnumeratedDiscovery,
    MetricSpec, ResourceKind, ScanMode, ScanScope, Scanner,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fleet telemetry scan runner
#[derive(Parser)]
#[command(name = "fleetscan")]
#[command(author, version, about = "Run a resource telemetry scan over a recorded inventory", long_about = None)]
struct Cli {
    /// Inventory fixture file (JSON)
    #[arg(long, env = "FLEETSCAN_INVENTORY")]
    inventory: PathBuf,

    /// Recorded metric series file (JSON); resources without a
    /// recording get an error payload
    #[arg(long, env = "FLEETSCAN_RECORDINGS")]
    recordings: Option<PathBuf>,

    /// Scan mode (full | quick | sample); overrides FLEETSCAN_MODE
    #[arg(long)]
    mode: Option<ScanMode>,

    /// Worker pool concurrency ceiling
    #[arg(long)]
    workers: Option<usize>,

    /// Subset size for sample mode
    #[arg(long)]
    sample_size: Option<usize>,

    /// Discovery backend preference (auto | bulk-only | enumerated-only)
    #[arg(long)]
    backend: Option<BackendPreference>,

    /// Whole-scan time budget in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Sampler seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Metric name to collect (repeatable)
    #[arg(long = "metric")]
    metrics: Vec<String>,

    /// Lookback window in days
    #[arg(long, default_value_t = 7)]
    lookback_days: u32,

    /// Restrict discovery to one resource kind (repeatable)
    #[arg(long = "kind")]
    kinds: Vec<String>,

    /// Pretty-print the result JSON
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Environment settings first, command-line flags on top
    let mut config = EngineSettings::load()?.into_scan_config()?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(workers) = cli.workers {
        config.worker_ceiling = workers;
    }
    if let Some(sample_size) = cli.sample_size {
        config.sample_size = sample_size;
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(secs) = cli.timeout_secs {
        config.deadline = Some(Duration::from_secs(secs));
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    let inventory = Arc::new(replay::ReplayInventory::load(&cli.inventory)?);
    let metrics: Arc<dyn scan_lib::MetricProvider> = match &cli.recordings {
        Some(path) => Arc::new(replay::ReplayMetrics::load(path)?),
        None => Arc::new(replay::ReplayMetrics::empty()),
    };

    let scope = ScanScope {
        subscriptions: inventory.subscriptions(),
        kinds: cli.kinds.iter().map(|k| ResourceKind::from_label(k)).collect(),
    };

    let metric_names = if cli.metrics.is_empty() {
        vec!["Percentage CPU".to_string()]
    } else {
        cli.metrics.clone()
    };
    let spec = MetricSpec {
        names: metric_names,
        lookback_days: cli.lookback_days,
        aggregations: vec![scan_lib::Aggregation::Average, scan_lib::Aggregation::Maximum],
        interval_hint: Duration::from_secs(3600),
    };

    let selector = BackendSelector::new(
        Arc::new(BulkDiscovery::new(inventory.clone())),
        Arc::new(EnumeratedDiscovery::new(inventory.clone())),
        config.backend,
    );
    let scanner = Scanner::new(selector, metrics, config);

    let result = scanner.run(&scope, &spec).await?;

    info!(
        mode = %result.mode,
        discovered = result.total_resources_discovered,
        measured = result.resources_measured,
        ok = result.measured_ok(),
        errored = result.errored_resources().len(),
        backend = %result.discovery_backend_used,
        factor = result.extrapolation_factor,
        "Scan finished"
    );

    let json = if cli.pretty {
        serde_json::to_string_pretty(&result).context("Failed to serialize scan result")?
    } else {
        serde_json::to_string(&result).context("Failed to serialize scan result")?
    };
    println!("{}", json);

    Ok(())
}
