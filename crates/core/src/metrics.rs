//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (dispatches, outcomes, stale results, queue depth)
//! - Registry (registrations)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Orchestrator Metrics
// =============================================================================

/// Jobs dispatched to the engine.
pub static JOBS_DISPATCHED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_jobs_dispatched_total",
        "Total jobs dispatched to the conversion engine",
    )
    .unwrap()
});

/// Jobs that reached a terminal state, by result.
pub static JOBS_FINISHED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_jobs_finished_total",
            "Total jobs that reached a terminal state",
        ),
        &["result"], // "success", "failed", "cancelled"
    )
    .unwrap()
});

/// Engine results discarded because their job had been cancelled.
pub static STALE_RESULTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "convertino_stale_results_total",
        "Total engine results discarded after cancellation",
    )
    .unwrap()
});

/// Conversion duration in seconds.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "convertino_job_duration_seconds",
            "Duration of conversions",
        )
        .buckets(vec![0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 900.0, 3600.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

/// Jobs waiting for a slot.
pub static JOBS_QUEUED: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("convertino_jobs_queued", "Jobs waiting for a conversion slot").unwrap()
});

/// Jobs currently running in the engine.
pub static JOBS_PROCESSING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("convertino_jobs_processing", "Jobs currently converting").unwrap()
});

// =============================================================================
// Registry Metrics
// =============================================================================

/// Registration attempts by result.
pub static REGISTRATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "convertino_registrations_total",
            "Total file registration attempts",
        ),
        &["result"], // "accepted", "rejected"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Orchestrator
        Box::new(JOBS_DISPATCHED.clone()),
        Box::new(JOBS_FINISHED.clone()),
        Box::new(STALE_RESULTS.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_QUEUED.clone()),
        Box::new(JOBS_PROCESSING.clone()),
        // Registry
        Box::new(REGISTRATIONS.clone()),
    ]
}
