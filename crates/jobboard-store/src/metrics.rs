//! Store metrics collection.
//!
//! - Request counters by backend, operation and status
//! - Latency histograms
//! - Retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total store requests by backend, operation and status.
    pub const REQUESTS_TOTAL: &str = "store_requests_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "store_retries_total";

    /// Request latency in seconds by backend and operation.
    pub const LATENCY_SECONDS: &str = "store_latency_seconds";

    /// Documents evaluated in-process after a backend query.
    pub const RESIDUAL_DOCUMENTS_TOTAL: &str = "store_residual_documents_total";
}

/// Record metrics for a completed store request.
pub fn record_request(backend: &'static str, operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "backend" => backend,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "backend" => backend,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record documents that had to be filtered in-process.
pub fn record_residual(collection: &str, documents: usize) {
    counter!(
        names::RESIDUAL_DOCUMENTS_TOTAL,
        "collection" => collection.to_string()
    )
    .increment(documents as u64);
}
