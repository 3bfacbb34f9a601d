//! # Metrics
//!
//! Prometheus metrics for a replication run.
//!
//! ## Metrics Exposed
//!
//! - `secret_sync_secrets_processed_total` - Secrets that reached at least one target action
//! - `secret_sync_secrets_failed_total` - Secrets abandoned before any target action
//! - `secret_sync_target_operations_total` - Target outcomes, labelled by operation
//! - `secret_sync_target_errors_total` - Failed (secret, target) pairs
//! - `secret_sync_provider_operations_total` - Secrets Manager calls, labelled by operation
//! - `secret_sync_provider_operation_duration_seconds` - Duration of Secrets Manager calls
//! - `secret_sync_provider_operation_errors_total` - Failed Secrets Manager calls, labelled by operation
//! - `secret_sync_orphans_retired_total` - Orphaned secrets retired by cleanup
//! - `secret_sync_run_duration_seconds` - Duration of a full run
//!
//! The run is a batch job, so metrics are written in text format to a file
//! for the node-exporter textfile collector rather than served over HTTP.

use anyhow::{Context, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::path::Path;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static SECRETS_PROCESSED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_sync_secrets_processed_total",
        "Total number of secrets that reached at least one target action",
    )
    .expect("Failed to create SECRETS_PROCESSED_TOTAL metric - this should never happen")
});

static SECRETS_FAILED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_sync_secrets_failed_total",
        "Total number of secrets abandoned before any target action",
    )
    .expect("Failed to create SECRETS_FAILED_TOTAL metric - this should never happen")
});

static TARGET_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_target_operations_total",
            "Total number of target outcomes by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create TARGET_OPERATIONS_TOTAL metric - this should never happen")
});

static TARGET_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_sync_target_errors_total",
        "Total number of failed (secret, target) pairs",
    )
    .expect("Failed to create TARGET_ERRORS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_provider_operations_total",
            "Total number of Secrets Manager calls by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATIONS_TOTAL metric - this should never happen")
});

static PROVIDER_OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "secret_sync_provider_operation_duration_seconds",
            "Duration of Secrets Manager calls in seconds",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_DURATION metric - this should never happen")
});

static PROVIDER_OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "secret_sync_provider_operation_errors_total",
            "Total number of failed Secrets Manager calls by operation",
        ),
        &["operation"],
    )
    .expect("Failed to create PROVIDER_OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static ORPHANS_RETIRED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "secret_sync_orphans_retired_total",
        "Total number of orphaned secrets retired by cleanup",
    )
    .expect("Failed to create ORPHANS_RETIRED_TOTAL metric - this should never happen")
});

static RUN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "secret_sync_run_duration_seconds",
            "Duration of a replication run in seconds",
        )
        .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .expect("Failed to create RUN_DURATION metric - this should never happen")
});

/// Register every metric with the crate registry
///
/// # Errors
///
/// Returns an error if a metric is registered twice.
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(SECRETS_PROCESSED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SECRETS_FAILED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGET_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(TARGET_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(PROVIDER_OPERATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(ORPHANS_RETIRED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RUN_DURATION.clone()))?;

    Ok(())
}

pub fn increment_secrets_processed() {
    SECRETS_PROCESSED_TOTAL.inc();
}

pub fn increment_secrets_failed() {
    SECRETS_FAILED_TOTAL.inc();
}

pub fn record_target_outcome(operation: &str) {
    TARGET_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_target_errors() {
    TARGET_ERRORS_TOTAL.inc();
}

pub fn record_provider_operation(operation: &str, duration: f64) {
    PROVIDER_OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
    PROVIDER_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_provider_errors(operation: &str) {
    PROVIDER_OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation])
        .inc();
}

pub fn increment_orphans_retired(count: usize) {
    ORPHANS_RETIRED_TOTAL.inc_by(count as u64);
}

pub fn observe_run_duration(duration: f64) {
    RUN_DURATION.observe(duration);
}

/// Render the registry in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn render() -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not valid UTF-8")
}

/// Write the registry to `path`, replacing it atomically
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_textfile(path: &Path) -> Result<()> {
    let rendered = render()?;
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, rendered)
        .with_context(|| format!("Failed to write metrics to {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}
