//! # Observability
//!
//! - `metrics`: Prometheus metrics for deployment runs
//! - [`init_tracing`]: `tracing` subscriber setup

pub mod metrics;

use crate::config::RuntimeConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins; otherwise the crate logs at `LOG_LEVEL`.
pub fn init_tracing(runtime: &RuntimeConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(runtime.default_log_filter()));
    if let Err(e) = tracing_subscriber::fmt().with_env_filter(filter).try_init() {
        eprintln!("Tracing subscriber already initialized: {e}");
    }
}
