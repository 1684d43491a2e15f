//! Metrics definitions for the Casting API.
//!
//! All metrics follow Prometheus naming conventions:
//! - `casting_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `method`: 7 values max (GET, POST, PATCH, DELETE, PUT, HEAD, OPTIONS)
//! - `endpoint`: normalized paths (`/movies/{id}`, `/actors/{id}`, `/other`)
//! - `status`: 3 values (success, error, timeout)
//! - `outcome`: token verification outcomes, bounded by error kinds
//! - `operation`: bounded by repository methods

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder and return its handle for `/metrics`.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder cannot be installed (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("casting_http_request".to_string()),
            &[
                0.005, 0.010, 0.025, 0.050, 0.100, 0.150, 0.200, 0.300, 0.500, 1.000, 2.000,
            ],
        )
        .map_err(|e| format!("Failed to set HTTP request buckets: {e}"))?
        // Cache hits are sub-millisecond; misses include a JWKS round trip
        .set_buckets_for_metric(
            Matcher::Prefix("casting_token_validation".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token validation buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("casting_jwks_fetch".to_string()),
            &[0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS fetch buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("casting_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `casting_http_requests_total`, `casting_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
///
/// Captures every response, including framework-level rejections (400 on bad
/// JSON, 404 fallback, 405) and authorization failures.
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("casting_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status" => status
    )
    .record(duration.as_secs_f64());

    counter!("casting_http_requests_total",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint,
        "status_code" => status_code.to_string()
    )
    .increment(1);
}

/// Categorize HTTP status code into success/error/timeout
fn categorize_status_code(status_code: u16) -> &'static str {
    match status_code {
        200..=299 => "success",
        408 | 504 => "timeout",
        _ => "error",
    }
}

/// Normalize endpoint path to prevent label cardinality explosion
///
/// Replaces resource ids with `{id}`; anything unknown becomes `/other`.
fn normalize_endpoint(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/health" => "/health",
        "/metrics" => "/metrics",
        "/movies" => "/movies",
        "/actors" => "/actors",
        _ => normalize_dynamic_endpoint(path),
    }
}

fn normalize_dynamic_endpoint(path: &str) -> &'static str {
    let mut segments = path.trim_start_matches('/').split('/');

    match (segments.next(), segments.next(), segments.next()) {
        (Some("movies"), Some(id), None) if !id.is_empty() => "/movies/{id}",
        (Some("actors"), Some(id), None) if !id.is_empty() => "/actors/{id}",
        _ => "/other",
    }
}

// ============================================================================
// Authorization Metrics
// ============================================================================

/// Record a token verification outcome
///
/// Metric: `casting_token_validations_total`, `casting_token_validation_duration_seconds`
/// Labels: `outcome` (`success` or a verification error label)
pub fn record_token_validation(outcome: &'static str, duration: Duration) {
    histogram!("casting_token_validation_duration_seconds").record(duration.as_secs_f64());

    counter!("casting_token_validations_total",
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a JWKS fetch
///
/// Metric: `casting_jwks_fetches_total`, `casting_jwks_fetch_duration_seconds`
/// Labels: `status` (success, error)
pub fn record_key_set_fetch(status: &'static str, duration: Duration) {
    histogram!("casting_jwks_fetch_duration_seconds").record(duration.as_secs_f64());

    counter!("casting_jwks_fetches_total",
        "status" => status
    )
    .increment(1);
}

/// Record an authorization denial at the middleware boundary
///
/// Metric: `casting_auth_rejections_total`
/// Labels: `code` (authorization_header_missing, invalid_header, ...), `permission`
pub fn record_auth_rejection(code: &'static str, permission: &str) {
    counter!("casting_auth_rejections_total",
        "code" => code,
        "permission" => permission.to_string()
    )
    .increment(1);
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record database query execution
///
/// Metric: `casting_db_query_duration_seconds`, `casting_db_queries_total`
/// Labels: `operation`, `status`
///
/// Operations: list_movies, get_movie, insert_movie, update_movie,
///             delete_movie and the actor equivalents
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    histogram!("casting_db_query_duration_seconds",
        "operation" => operation
    )
    .record(duration.as_secs_f64());

    counter!("casting_db_queries_total",
        "operation" => operation,
        "status" => status
    )
    .increment(1);
}

// ============================================================================
// Tests
// ============================================================================
