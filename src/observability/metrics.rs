//! # Metrics
//!
//! Prometheus metrics for deployment runs.
//!
//! A run is a short-lived process, so instead of serving `/metrics` the
//! binary writes the registry in text exposition format to a file that a
//! node-exporter text-file collector picks up.
//!
//! ## Metrics Exposed
//!
//! - `kube_deployer_runs_total` - Total number of deployment runs
//! - `kube_deployer_run_errors_total` - Failed runs by error kind
//! - `kube_deployer_run_duration_seconds` - Duration of deployment runs
//! - `kube_deployer_resources_total` - Resources processed by action
//!   (`created`, `replaced`, `deleted`, `absent`, `skipped`)

use anyhow::{Context, Result};
use prometheus::{Encoder, Histogram, IntCounter, IntCounterVec, Registry, TextEncoder};
use std::path::Path;
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RUNS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("kube_deployer_runs_total", "Total number of deployment runs")
        .expect("Failed to create RUNS_TOTAL metric - this should never happen")
});

static RUN_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_deployer_run_errors_total",
            "Total number of failed deployment runs by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RUN_ERRORS_TOTAL metric - this should never happen")
});

static RUN_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "kube_deployer_run_duration_seconds",
            "Duration of deployment runs in seconds",
        )
        .buckets(vec![0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]),
    )
    .expect("Failed to create RUN_DURATION metric - this should never happen")
});

static RESOURCES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "kube_deployer_resources_total",
            "Total number of resources processed by action",
        ),
        &["action"],
    )
    .expect("Failed to create RESOURCES_TOTAL metric - this should never happen")
});

fn register<C: prometheus::core::Collector + Clone + 'static>(collector: &C) -> Result<()> {
    match REGISTRY.register(Box::new(collector.clone())) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Register every deployer metric; calling it again is a no-op
pub fn register_metrics() -> Result<()> {
    register(&*RUNS_TOTAL)?;
    register(&*RUN_ERRORS_TOTAL)?;
    register(&*RUN_DURATION)?;
    register(&*RESOURCES_TOTAL)?;
    Ok(())
}

pub fn increment_runs() {
    RUNS_TOTAL.inc();
}

pub fn increment_run_errors(kind: &str) {
    RUN_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_run_duration(duration: f64) {
    RUN_DURATION.observe(duration);
}

pub fn record_resource(action: &str) {
    RESOURCES_TOTAL.with_label_values(&[action]).inc();
}

/// Registry contents in text exposition format
pub fn gather_text() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics output is not UTF-8")
}

/// Write the registry to `path` for a text-file collector
pub fn write_text_file(path: &Path) -> Result<()> {
    let text = gather_text()?;
    std::fs::write(path, text)
        .with_context(|| format!("Failed to write metrics to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent_and_text_is_written() {
        register_metrics().unwrap();
        register_metrics().unwrap();

        increment_runs();
        record_resource("created");
        increment_run_errors("AuthorizationError");
        observe_run_duration(1.5);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kube_deployer.prom");
        write_text_file(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("kube_deployer_runs_total"));
        assert!(text.contains("kube_deployer_resources_total{action=\"created\"}"));
        assert!(text.contains("kube_deployer_run_errors_total{kind=\"AuthorizationError\"}"));
    }
}
