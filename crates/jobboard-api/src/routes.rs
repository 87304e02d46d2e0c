//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::Uri;
use axum::middleware;
use axum::routing::{delete, get, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::error::ApiError;
use crate::handlers::{
    apply_job, delete_job, delete_me, delete_user, forgot_password, get_applied_jobs, get_job,
    get_jobs, get_jobs_in_radius, get_profile, get_published_jobs, get_users, health, job_stats,
    login, logout, new_job, ready, register, reset_password, update_job, update_password,
    update_profile,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("{} route not found", uri))
}

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let job_routes = Router::new()
        .route("/jobs", get(get_jobs))
        .route("/job/new", post(new_job))
        .route("/job/:id/:slug", get(get_job))
        .route("/jobs/:zipcode/:distance", get(get_jobs_in_radius))
        .route("/job/:id", put(update_job).delete(delete_job))
        .route("/stats/:topic", get(job_stats))
        .route("/job/:id/apply", put(apply_job));

    let auth_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/password/forgot", post(forgot_password))
        .route("/password/reset/:token", put(reset_password))
        .route("/logout", get(logout));

    let user_routes = Router::new()
        .route("/me", get(get_profile))
        .route("/password/update", put(update_password))
        .route("/me/update", put(update_profile))
        .route("/me/delete", delete(delete_me))
        .route("/jobs/applied", get(get_applied_jobs))
        .route("/jobs/published", get(get_published_jobs))
        .route("/users", get(get_users))
        .route("/user/:id", delete(delete_user));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_max,
        state.config.rate_limit_window,
    ));

    let api_routes = Router::new()
        .merge(job_routes)
        .merge(auth_routes)
        .merge(user_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .fallback(route_not_found)
        // Body size is enforced by the tower layer only
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
