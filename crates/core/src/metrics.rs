//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Lifecycle operations (start, stop, delete) and their outcomes
//! - Port allocation
//! - Lock contention
//! - Status sweeps

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Lifecycle Metrics
// =============================================================================

/// Lifecycle operations by operation and outcome.
pub static LIFECYCLE_OPERATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gamehost_lifecycle_operations_total",
            "Total lifecycle operations",
        ),
        // operation: "start", "stop", "delete"
        // outcome: "transitioned", "already_in_state", "busy", "failed"
        &["operation", "outcome"],
    )
    .unwrap()
});

/// Lifecycle operation duration in seconds, lock wait included.
pub static LIFECYCLE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "gamehost_lifecycle_duration_seconds",
            "Duration of lifecycle operations",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["operation"],
    )
    .unwrap()
});

/// Lock acquisitions that timed out.
pub static LOCK_TIMEOUTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gamehost_lock_timeouts_total",
        "Lock acquisitions that timed out",
    )
    .unwrap()
});

// =============================================================================
// Port Allocation Metrics
// =============================================================================

/// Candidates drawn per successful allocation.
pub static PORT_ALLOCATION_ATTEMPTS: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "gamehost_port_allocation_attempts",
            "Candidates drawn per successful port allocation",
        )
        .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 10.0]),
    )
    .unwrap()
});

/// Allocations that exhausted their attempts.
pub static PORT_ALLOCATION_FAILURES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "gamehost_port_allocation_failures_total",
        "Port allocations that found no free port",
    )
    .unwrap()
});

// =============================================================================
// Status Sweep Metrics
// =============================================================================

/// Completed sweeps.
pub static SWEEP_RUNS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("gamehost_sweep_runs_total", "Completed status sweeps").unwrap()
});

/// Statuses corrected by refresh, by new status.
pub static STATUS_CORRECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "gamehost_status_corrections_total",
            "Stored statuses corrected to match the container engine",
        ),
        &["status"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Lifecycle
        Box::new(LIFECYCLE_OPERATIONS.clone()),
        Box::new(LIFECYCLE_DURATION.clone()),
        Box::new(LOCK_TIMEOUTS.clone()),
        // Ports
        Box::new(PORT_ALLOCATION_ATTEMPTS.clone()),
        Box::new(PORT_ALLOCATION_FAILURES.clone()),
        // Sweep
        Box::new(SWEEP_RUNS.clone()),
        Box::new(STATUS_CORRECTIONS.clone()),
    ]
}
