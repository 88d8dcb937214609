//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Conversions (results, durations, in-flight encoders)
//! - Scheduler (promotions, evictions, status counts, disk space)
//! - Inputs (bytes received by source)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts};

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversions finished, by media kind and result.
pub static CONVERSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("webpit_conversions_total", "Total conversions finished"),
        &["kind", "result"], // kind: "image", "video", "unknown"; result: "success", "failed"
    )
    .unwrap()
});

/// Conversion duration in seconds, from claim to terminal state.
pub static CONVERSION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "webpit_conversion_duration_seconds",
            "Duration of conversions",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["kind"],
    )
    .unwrap()
});

/// Encoders currently running, by media kind.
pub static CONVERSIONS_IN_FLIGHT: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "webpit_conversions_in_flight",
            "Encoder processes currently running",
        ),
        &["kind"],
    )
    .unwrap()
});

/// Conversion failures by error kind.
pub static CONVERSION_ERRORS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("webpit_conversion_errors_total", "Total conversion errors"),
        &["error"],
    )
    .unwrap()
});

// =============================================================================
// Input Metrics
// =============================================================================

/// Input bytes stored, by source.
pub static INPUT_BYTES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("webpit_input_bytes_total", "Total input bytes stored"),
        &["source"], // "stream", "content", "url"
    )
    .unwrap()
});

// =============================================================================
// Scheduler Metrics
// =============================================================================

/// Records promoted from queued to converting.
pub static PROMOTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "webpit_promotions_total",
        "Total conversions promoted by the scheduler",
    )
    .unwrap()
});

/// Expired records deleted by the scheduler.
pub static EVICTIONS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "webpit_evictions_total",
        "Total expired conversions evicted",
    )
    .unwrap()
});

/// Records recovered from disk at startup, by status at load time.
pub static RECOVERED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "webpit_recovered_conversions_total",
            "Conversions loaded by the recovery scan",
        ),
        &["status"],
    )
    .unwrap()
});

/// Records currently in each status, as of the last scheduler pass.
pub static CONVERSIONS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "webpit_conversions",
            "Conversions by status at the last scheduler pass",
        ),
        &["status"],
    )
    .unwrap()
});

/// Last sampled free space on the files volume, in bytes.
pub static DISK_FREE_BYTES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "webpit_disk_free_bytes",
        "Free space on the files volume at the last sample",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Conversions
        Box::new(CONVERSIONS_TOTAL.clone()),
        Box::new(CONVERSION_DURATION.clone()),
        Box::new(CONVERSIONS_IN_FLIGHT.clone()),
        Box::new(CONVERSION_ERRORS.clone()),
        // Inputs
        Box::new(INPUT_BYTES.clone()),
        // Scheduler
        Box::new(PROMOTIONS.clone()),
        Box::new(EVICTIONS.clone()),
        Box::new(RECOVERED.clone()),
        Box::new(CONVERSIONS_BY_STATUS.clone()),
        Box::new(DISK_FREE_BYTES.clone()),
    ]
}
