//! Metric definitions for the live service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `live_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `method`: HTTP methods
//! - `endpoint`: the route table below plus `/other`
//! - `status`: success, error, timeout
//! - `outcome`: bounded by [`UploadOutcome`]

use metrics::{counter, gauge, histogram};
use std::time::Duration;

// ============================================================================
// HTTP Request Metrics
// ============================================================================

/// Record HTTP request completion
///
/// Metric: `live_http_requests_total`, `live_http_request_duration_seconds`
/// Labels: `method`, `endpoint`, `status` / `status_code`
pub fn record_http_request(method: &str, endpoint: &str, status_code: u16, duration: Duration) {
    let normalized_endpoint = normalize_endpoint(endpoint);
    let status = categorize_status_code(status_code);

    histogram!("live_http_request_duration_seconds",
        "method" => method.to_string(),
        "endpoint" => normalized_endpoint.clone(),
        "status" => status.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("live_http_requests_total",
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

/// Normalize endpoint path to bound label cardinality.
///
/// Room ids are replaced with `{id}`; unknown paths become `/other`.
fn normalize_endpoint(path: &str) -> String {
    match path {
        "/health" | "/metrics" | "/live/rooms" | "/live/stream-key" | "/live/upload" => {
            path.to_string()
        }
        _ => {
            let is_room_path = path
                .strip_prefix("/live/rooms/")
                .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'));
            if is_room_path {
                "/live/rooms/{id}".to_string()
            } else {
                "/other".to_string()
            }
        }
    }
}

// ============================================================================
// Room Metrics
// ============================================================================

/// Record a room being created.
///
/// Metric: `live_rooms_created_total`
pub fn record_room_created() {
    counter!("live_rooms_created_total").increment(1);
}

/// Set the number of rooms currently registered.
///
/// Metric: `live_rooms_active`
#[allow(clippy::cast_precision_loss)]
pub fn set_rooms_active(count: usize) {
    gauge!("live_rooms_active").set(count as f64);
}

// ============================================================================
// Upload Session Metrics
// ============================================================================

/// How an upload session attempt ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Negotiated and registered.
    Started,
    /// Identity already had a session.
    Rejected,
    /// Transport negotiation failed.
    Failed,
    /// Closed while still pending after the negotiation timeout.
    TimedOut,
    /// Session exited and was removed.
    Ended,
}

impl UploadOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            UploadOutcome::Started => "started",
            UploadOutcome::Rejected => "rejected",
            UploadOutcome::Failed => "failed",
            UploadOutcome::TimedOut => "timed_out",
            UploadOutcome::Ended => "ended",
        }
    }
}

/// Record an upload session outcome.
///
/// Metric: `live_upload_sessions_total`
/// Labels: `outcome`
pub fn record_upload_session(outcome: UploadOutcome) {
    counter!("live_upload_sessions_total", "outcome" => outcome.as_str()).increment(1);
}

/// Set the number of registered upload sessions (any slot state).
///
/// Metric: `live_upload_sessions_active`
#[allow(clippy::cast_precision_loss)]
pub fn set_upload_sessions_active(count: usize) {
    gauge!("live_upload_sessions_active").set(count as f64);
}
