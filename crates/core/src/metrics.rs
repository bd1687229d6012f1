//! Prometheus metrics for core components.
//!
//! Covers holds, the background passes, checkout and gate validation. The
//! server registers everything from [`all_metrics`] in its registry.

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Reservation Ledger
// =============================================================================

/// Holds placed total (includes refreshes by the same holder).
pub static HOLDS_PLACED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("boletera_holds_placed_total", "Total seat holds placed").unwrap()
});

/// Holds released explicitly by their holder.
pub static HOLDS_RELEASED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boletera_holds_released_total",
        "Total seat holds released by their holder",
    )
    .unwrap()
});

/// Ledger rejections by reason.
pub static HOLD_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_hold_rejections_total",
            "Hold or release requests rejected",
        ),
        &["reason"], // "already_reserved", "already_occupied", "unavailable", ...
    )
    .unwrap()
});

/// Availability toggles by scope.
pub static AVAILABILITY_TOGGLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_availability_toggles_total",
            "Administrative availability toggles",
        ),
        &["scope"],
    )
    .unwrap()
});

/// Lost optimistic-version races that were retried.
pub static VERSION_CONFLICTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boletera_version_conflicts_total",
        "Event writes retried after a version conflict",
    )
    .unwrap()
});

// =============================================================================
// Background passes
// =============================================================================

/// Holds released by the expiry sweep.
pub static HOLDS_EXPIRED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "boletera_holds_expired_total",
        "Total seat holds released by the expiry sweep",
    )
    .unwrap()
});

/// Duration of one pass in seconds.
pub static PASS_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "boletera_pass_duration_seconds",
            "Duration of a sweep or classification pass",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["pass"], // "sweep", "classify"
    )
    .unwrap()
});

/// Events a pass could not process.
pub static PASS_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_pass_event_failures_total",
            "Events skipped by a pass because of an error",
        ),
        &["pass"],
    )
    .unwrap()
});

/// Status transitions by target status.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_status_transitions_total",
            "Event status changes",
        ),
        &["to"],
    )
    .unwrap()
});

// =============================================================================
// Checkout and gate
// =============================================================================

pub static ORDERS_COMMITTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("boletera_orders_committed_total", "Total orders committed").unwrap()
});

pub static TICKETS_SOLD: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("boletera_tickets_sold_total", "Total tickets sold").unwrap()
});

/// Commit rejections by reason.
pub static COMMIT_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_commit_rejections_total",
            "Checkout commits rejected",
        ),
        &["reason"], // "sold_out", "tier_not_found", "seat_not_held", "storage", ...
    )
    .unwrap()
});

/// Gate validations by result.
pub static TICKETS_VALIDATED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "boletera_tickets_validated_total",
            "Gate validation attempts",
        ),
        &["result"], // "ok", "not_found", "event_mismatch", "already_used", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Ledger
        Box::new(HOLDS_PLACED.clone()),
        Box::new(HOLDS_RELEASED.clone()),
        Box::new(HOLD_REJECTIONS.clone()),
        Box::new(AVAILABILITY_TOGGLES.clone()),
        Box::new(VERSION_CONFLICTS.clone()),
        // Passes
        Box::new(HOLDS_EXPIRED.clone()),
        Box::new(PASS_DURATION.clone()),
        Box::new(PASS_FAILURES.clone()),
        Box::new(STATUS_TRANSITIONS.clone()),
        // Checkout and gate
        Box::new(ORDERS_COMMITTED.clone()),
        Box::new(TICKETS_SOLD.clone()),
        Box::new(COMMIT_REJECTIONS.clone()),
        Box::new(TICKETS_VALIDATED.clone()),
    ]
}
