//! Metrics collection for the ERNIE client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::types::common::Usage;

/// Metrics collector for tracking API usage.
pub trait MetricsCollector: Send + Sync {
    /// Records a completed request.
    fn record_request(&self, endpoint: &str, duration: Duration, success: bool);

    /// Records token usage.
    fn record_tokens(&self, usage: &Usage);

    /// Records an error.
    fn record_error(&self, endpoint: &str, error_type: &str);

    /// Gets current metrics snapshot.
    fn snapshot(&self) -> ServiceMetrics;
}

/// Aggregated service metrics.
#[derive(Debug, Clone, Default)]
pub struct ServiceMetrics {
    /// Total requests made.
    pub total_requests: u64,
    /// Successful requests.
    pub successful_requests: u64,
    /// Failed requests.
    pub failed_requests: u64,
    /// Total prompt tokens.
    pub total_prompt_tokens: u64,
    /// Total completion tokens.
    pub total_completion_tokens: u64,
    /// Average request duration in milliseconds.
    pub avg_duration_ms: f64,
    /// Requests per endpoint.
    pub requests_by_endpoint: HashMap<String, u64>,
    /// Errors by type.
    pub errors_by_type: HashMap<String, u64>,
}

/// Default in-memory metrics collector.
#[derive(Default)]
pub struct DefaultMetricsCollector {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_prompt_tokens: AtomicU64,
    total_completion_tokens: AtomicU64,
    total_duration_ms: AtomicU64,
    requests_by_endpoint: RwLock<HashMap<String, u64>>,
    errors_by_type: RwLock<HashMap<String, u64>>,
}

impl DefaultMetricsCollector {
    /// Creates a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsCollector for DefaultMetricsCollector {
    fn record_request(&self, endpoint: &str, duration: Duration, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);

        *self
            .requests_by_endpoint
            .write()
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    fn record_tokens(&self, usage: &Usage) {
        self.total_prompt_tokens
            .fetch_add(usage.prompt_tokens, Ordering::Relaxed);
        self.total_completion_tokens
            .fetch_add(usage.completion_tokens, Ordering::Relaxed);
    }

    fn record_error(&self, _endpoint: &str, error_type: &str) {
        *self
            .errors_by_type
            .write()
            .entry(error_type.to_string())
            .or_insert(0) += 1;
    }

    fn snapshot(&self) -> ServiceMetrics {
        let total = self.total_requests.load(Ordering::Relaxed);
        let total_duration_ms = self.total_duration_ms.load(Ordering::Relaxed);

        ServiceMetrics {
            total_requests: total,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            total_prompt_tokens: self.total_prompt_tokens.load(Ordering::Relaxed),
            total_completion_tokens: self.total_completion_tokens.load(Ordering::Relaxed),
            avg_duration_ms: if total > 0 {
                total_duration_ms as f64 / total as f64
            } else {
                0.0
            },
            requests_by_endpoint: self.requests_by_endpoint.read().clone(),
            errors_by_type: self.errors_by_type.read().clone(),
        }
    }
}

/// No-op collector for when metrics are disabled.
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_request(&self, _endpoint: &str, _duration: Duration, _success: bool) {}
    fn record_tokens(&self, _usage: &Usage) {}
    fn record_error(&self, _endpoint: &str, _error_type: &str) {}
    fn snapshot(&self) -> ServiceMetrics {
        ServiceMetrics::default()
    }
}
