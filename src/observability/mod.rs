//! Observability module for metrics and structured logging.

pub mod metrics;

pub use metrics::{DefaultMetricsCollector, MetricsCollector, ServiceMetrics};

/// Installs a `tracing` subscriber reading the `RUST_LOG` environment
/// filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
