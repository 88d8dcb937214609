//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the webpit server:
//! - HTTP request metrics (latency, counts, in flight)
//! - Upload admission and download outcomes
//! - Orchestrator state (collected dynamically)
//!
//! Conversion metrics live in `webpit_core::metrics` and are registered here.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use regex_lite::Regex;
use tracing::warn;

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
            "webpit_http_request_duration_seconds",
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
        Opts::new("webpit_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "webpit_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Upload / Download Metrics
// =============================================================================

/// Uploads refused before any record was created.
pub static UPLOADS_REJECTED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "webpit_uploads_rejected_total",
            "Uploads rejected by admission control",
        ),
        &["reason"],
    )
    .unwrap()
});

/// Download attempts by outcome.
pub static DOWNLOADS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("webpit_downloads_total", "Download requests by outcome"),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Orchestrator Metrics (collected dynamically)
// =============================================================================

/// Orchestrator running state (1 = running, 0 = stopped).
pub static ORCHESTRATOR_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "webpit_orchestrator_running",
        "Whether the orchestrator is running (1) or stopped (0)",
    )
    .unwrap()
});

/// Records currently held in memory.
pub static CONVERSIONS_REGISTERED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "webpit_conversions_registered",
        "Number of conversion records held in memory",
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

    // Uploads and downloads
    registry
        .register(Box::new(UPLOADS_REJECTED.clone()))
        .unwrap();
    registry
        .register(Box::new(DOWNLOADS_TOTAL.clone()))
        .unwrap();

    // Orchestrator
    registry
        .register(Box::new(ORCHESTRATOR_RUNNING.clone()))
        .unwrap();
    registry
        .register(Box::new(CONVERSIONS_REGISTERED.clone()))
        .unwrap();

    // Core metrics (conversions, scheduler, disk)
    for metric in webpit_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Collect dynamic metrics from current application state.
///
/// Called before encoding so gauges reflect the orchestrator right now.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    let orchestrator = state.orchestrator();
    ORCHESTRATOR_RUNNING.set(i64::from(orchestrator.is_running()));
    CONVERSIONS_REGISTERED.set(orchestrator.registered() as i64);
}

static UUID_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});

/// Normalize a path for metric labels (replace ids with placeholders).
pub fn normalize_path(path: &str) -> String {
    UUID_REGEX.replace_all(path, "{id}").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_uuid() {
        let path = "/conversions/550e8400-e29b-41d4-a716-446655440000";
        assert_eq!(normalize_path(path), "/conversions/{id}");
    }

    #[test]
    fn test_normalize_path_no_ids() {
        assert_eq!(normalize_path("/convert"), "/convert");
        assert_eq!(normalize_path("/health"), "/health");
    }

    #[test]
    fn test_encode_metrics_returns_prometheus_format() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["GET", "/test", "200"])
            .inc();

        let output = encode_metrics();
        assert!(output.contains("webpit_http_requests_total"));
        assert!(output.contains("# HELP"));
        assert!(output.contains("# TYPE"));
    }

    #[test]
    fn test_registry_contains_core_metrics() {
        // Prometheus only outputs vector metrics that have a label set
        webpit_core::metrics::CONVERSIONS_TOTAL
            .with_label_values(&["image", "completed"])
            .inc_by(0);
        webpit_core::metrics::EVICTIONS.inc_by(0);
        UPLOADS_REJECTED.with_label_values(&["too_many_files"]).inc_by(0);
        ORCHESTRATOR_RUNNING.set(0);

        let output = encode_metrics();

        assert!(output.contains("webpit_conversions_total"));
        assert!(output.contains("webpit_evictions_total"));
        assert!(output.contains("webpit_uploads_rejected_total"));
        assert!(output.contains("webpit_orchestrator_running"));
    }
}
