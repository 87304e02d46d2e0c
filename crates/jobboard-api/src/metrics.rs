//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Install the Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "jobboard_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "jobboard_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "jobboard_http_requests_in_flight";

    // Listing metrics
    pub const JOBS_CREATED_TOTAL: &str = "jobboard_jobs_created_total";
    pub const JOBS_DELETED_TOTAL: &str = "jobboard_jobs_deleted_total";
    pub const APPLICATIONS_TOTAL: &str = "jobboard_applications_total";

    // Account metrics
    pub const USERS_REGISTERED_TOTAL: &str = "jobboard_users_registered_total";
    pub const LOGINS_TOTAL: &str = "jobboard_logins_total";
    pub const EMAILS_TOTAL: &str = "jobboard_emails_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "jobboard_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_created() {
    counter!(names::JOBS_CREATED_TOTAL).increment(1);
}

pub fn record_job_deleted() {
    counter!(names::JOBS_DELETED_TOTAL).increment(1);
}

/// Record an application attempt (`accepted` or `rejected`).
pub fn record_application(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::APPLICATIONS_TOTAL, &labels).increment(1);
}

pub fn record_user_registered(role: &str) {
    let labels = [("role", role.to_string())];
    counter!(names::USERS_REGISTERED_TOTAL, &labels).increment(1);
}

pub fn record_login(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::LOGINS_TOTAL, &labels).increment(1);
}

pub fn record_email(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::EMAILS_TOTAL, &labels).increment(1);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}").ok()
});
static NUMERIC_SEGMENT: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/[0-9]+\b").ok());
static JOB_SLUG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/job/:id/[a-z0-9-]+$").ok());
static RESET_TOKEN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"/password/reset/[0-9a-fA-F]+$").ok());

fn replace(regex: &LazyLock<Option<Regex>>, path: String, with: &str) -> String {
    match regex.as_ref() {
        Some(re) => re.replace_all(&path, with).into_owned(),
        None => path,
    }
}

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = replace(&RESET_TOKEN, path.to_string(), "/password/reset/:token");
    let path = replace(&UUID_SEGMENT, path, ":id");
    let path = replace(&NUMERIC_SEGMENT, path, "/:id");
    if path.ends_with("/apply") {
        path
    } else {
        replace(&JOB_SLUG, path, "/job/:id/:slug")
    }
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}
