//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the convertino server:
//! - HTTP request metrics (latency, counts)
//! - WebSocket connection metrics
//! - Registry and orchestrator gauges (collected dynamically)
//! - Core job metrics registered from `convertino_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use tracing::error;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convertino_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convertino_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convertino_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// WebSocket Metrics
// =============================================================================

/// Active WebSocket connections.
pub static WS_CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convertino_ws_connections_active",
        "Number of active WebSocket connections",
    )
    .unwrap()
});

/// Total WebSocket connections (cumulative).
pub static WS_CONNECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_ws_connections_total",
        "Total WebSocket connections since startup",
    )
    .unwrap()
});

/// WebSocket messages sent by event kind.
pub static WS_MESSAGES_SENT: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("convertino_ws_messages_sent_total", "WebSocket messages sent"),
        &["type"],
    )
    .unwrap()
});

/// WebSocket lag events (when client falls behind).
pub static WS_LAG_EVENTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_ws_lag_events_total",
        "WebSocket lag events (client fell behind)",
    )
    .unwrap()
});

// =============================================================================
// Registry Metrics
// =============================================================================

/// Registered files by conversion status (collected dynamically).
pub static FILES_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "convertino_files_by_status",
            "Registered files by conversion status",
        ),
        &["status"],
    )
    .unwrap()
});

/// Entries in the completed-jobs ledger (collected dynamically).
pub static COMPLETED_JOBS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convertino_completed_jobs",
        "Number of entries in the completed-jobs ledger",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Whether the orchestrator is running (1) or stopped (0).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convertino_orchestrator_running",
        "Whether the conversion orchestrator is running",
    )
    .unwrap()
});

/// Current concurrency limit.
pub static CONCURRENCY_LIMIT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "convertino_concurrency_limit",
        "Maximum number of simultaneous conversions",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    // WebSocket
    registry
        .register(Box::new(WS_CONNECTIONS_ACTIVE.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_CONNECTIONS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(WS_MESSAGES_SENT.clone()))
        .unwrap();
    registry.register(Box::new(WS_LAG_EVENTS.clone())).unwrap();

    // Registry
    registry
        .register(Box::new(FILES_BY_STATUS.clone()))
        .unwrap();
    registry.register(Box::new(COMPLETED_JOBS.clone())).unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(CONCURRENCY_LIMIT.clone()))
        .unwrap();

    // Core metrics (jobs, registrations)
    for metric in convertino_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so the gauges reflect the registry, ledger and
/// orchestrator as they are right now.
pub async fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let ctx = state.context();

    let orchestrator = ctx.status().await;
    ORCHESTRATOR_RUNNING.set(if orchestrator.running { 1 } else { 0 });
    CONCURRENCY_LIMIT.set(orchestrator.limit as i64);

    let files = ctx.files();
    for status in convertino_core::ConversionStatus::ALL {
        let count = files
            .iter()
            .filter(|e| e.conversion_status == status)
            .count();
        FILES_BY_STATUS
            .with_label_values(&[status.as_str()])
            .set(count as i64);
    }

    if let Ok(completed) = ctx.completed_jobs() {
        COMPLETED_JOBS.set(completed.len() as i64);
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    static NUMERIC: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"/\d+(/|$)").unwrap());
    static EXTENSION: Lazy<regex_lite::Regex> =
        Lazy::new(|| regex_lite::Regex::new(r"^(/api/v1/capabilities/)[^/]+$").unwrap());

    // Applied twice: adjacent numeric segments share a slash.
    let result = NUMERIC.replace_all(path, "/{id}$1");
    let result = NUMERIC.replace_all(&result, "/{id}$1");
    let result = EXTENSION.replace(&result, "${1}{extension}");
    result.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_numeric() {
        assert_eq!(normalize_path("/api/v1/files/42"), "/api/v1/files/{id}");
    }

    #[test]
    fn test_normalize_path_numeric_middle() {
        assert_eq!(
            normalize_path("/api/v1/files/42/target"),
            "/api/v1/files/{id}/target"
        );
        assert_eq!(
            normalize_path("/api/v1/jobs/7/cancel"),
            "/api/v1/jobs/{id}/cancel"
        );
    }

    #[test]
    fn test_normalize_path_extension() {
        assert_eq!(
            normalize_path("/api/v1/capabilities/mov"),
            "/api/v1/capabilities/{extension}"
        );
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(normalize_path("/api/v1/files/error"), "/api/v1/files/error");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("convertino_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_all_metrics() {
        // Prometheus only outputs metrics that have been touched
        HTTP_REQUEST_DURATION
            .with_label_values(&["GET", "/test", "200"])
            .observe(0.1);
        HTTP_REQUESTS_IN_FLIGHT.set(0);
        WS_CONNECTIONS_ACTIVE.set(0);
        WS_CONNECTIONS_TOTAL.inc();
        FILES_BY_STATUS.with_label_values(&["idle"]).set(0);
        COMPLETED_JOBS.set(0);
        ORCHESTRATOR_RUNNING.set(0);
        CONCURRENCY_LIMIT.set(2);
        convertino_core::metrics::JOBS_DISPATCHED.inc();

        let output = encode_metrics();

        assert!(output.contains("convertino_http_request_duration_seconds"));
        assert!(output.contains("convertino_http_requests_in_flight"));
        assert!(output.contains("convertino_ws_connections_active"));
        assert!(output.contains("convertino_ws_connections_total"));
        assert!(output.contains("convertino_files_by_status"));
        assert!(output.contains("convertino_completed_jobs"));
        assert!(output.contains("convertino_orchestrator_running"));
        assert!(output.contains("convertino_concurrency_limit"));
        assert!(output.contains("convertino_jobs_dispatched_total"));
    }
}
