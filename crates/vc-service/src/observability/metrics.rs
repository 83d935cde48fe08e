//! Metrics definitions for the Videocall Controller.
//!
//! All metrics follow Prometheus naming conventions:
//! - `vc_` prefix for the Videocall Controller
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `operation`: bounded by code (insert_session, mark_left, ...)
//! - `status`: 2 values (success, error)
//! - `kind`: 4 values (quick_join, join, refresh, reconnect)
//! - `error_type`: bounded by error variants

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded. Histogram buckets
/// target sub-50ms DB queries and sub-second provider calls.
///
/// # Errors
///
/// Returns error if the Prometheus recorder fails to install (e.g.,
/// already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Prefix("vc_db_query".to_string()),
            &[
                0.001, 0.002, 0.005, 0.010, 0.020, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set DB query buckets: {e}"))?
        .set_buckets_for_metric(
            Matcher::Prefix("vc_provider_call".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.200, 0.500, 1.000, 2.000, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set provider call buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Database Metrics
// ============================================================================

/// Record a database query with its outcome and duration.
pub fn record_db_query(operation: &'static str, status: &'static str, duration: Duration) {
    counter!("vc_db_queries_total", "operation" => operation, "status" => status).increment(1);
    histogram!("vc_db_query_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

// ============================================================================
// RTC Provider Metrics
// ============================================================================

/// Record an RTC provider API call with its outcome and duration.
pub fn record_provider_call(operation: &'static str, status: &'static str, duration: Duration) {
    counter!("vc_provider_calls_total", "operation" => operation, "status" => status).increment(1);
    histogram!("vc_provider_call_duration_seconds", "operation" => operation)
        .record(duration.as_secs_f64());
}

// ============================================================================
// Join Flow Metrics
// ============================================================================

/// Record the outcome of a join-type operation.
///
/// `kind` is one of: quick_join, join, refresh, reconnect.
pub fn record_join(kind: &'static str, status: &'static str, error_type: Option<&'static str>) {
    match error_type {
        Some(error_type) => {
            counter!(
                "vc_joins_total",
                "kind" => kind,
                "status" => status,
                "error_type" => error_type
            )
            .increment(1);
        }
        None => {
            counter!("vc_joins_total", "kind" => kind, "status" => status).increment(1);
        }
    }
}

/// Record a session creation (quick-join creating a new room).
pub fn record_session_created() {
    counter!("vc_sessions_created_total").increment(1);
}

/// Record a transcript save outcome.
pub fn record_chat_save(status: &'static str) {
    counter!("vc_chat_saves_total", "status" => status).increment(1);
}
