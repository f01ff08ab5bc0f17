//! Prometheus metrics exposition
//!
//! - `xero_requests_total` (counter): labels `route`, `status`
//! - `xero_request_duration_seconds` (histogram): label `route`
//! - `xero_upstream_errors_total` (counter): label `kind`

use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_DURATION: &str = "xero_request_duration_seconds";

/// Bucket boundaries from 5ms to 60s. A `/xero` call runs up to a dozen
/// sequential upstream requests, each bounded by the HTTP timeout.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_DURATION.to_string()), DURATION_BUCKETS)
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
///
/// The duration metric is configured with explicit buckets so it renders as
/// a histogram (`_bucket` lines) instead of a summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Counters reported by `/health`.
#[derive(Debug, Clone)]
pub struct ServiceMetrics {
    pub requests_total: Arc<AtomicU64>,
    pub errors_total: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl ServiceMetrics {
    pub fn new() -> Self {
        Self {
            requests_total: Arc::new(AtomicU64::new(0)),
            errors_total: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }
}

/// Record a completed `/xero` request.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "xero_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "route" => route.to_string()).record(duration_secs);
}

/// Record a failed call to Xero, labelled with the error kind.
pub fn record_upstream_error(kind: &str) {
    metrics::counter!("xero_upstream_errors_total", "kind" => kind.to_string()).increment(1);
}
