//! Metric instruments, created from the global `"habit-tracker"` meter.
//! Without a configured provider these are no-ops.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("habit-tracker")
}

/// Counter: habit transitions applied.
/// Labels: `transition` ("create" | "complete" | "edit" | "rollover" | "delete").
pub fn habit_transitions() -> Counter<u64> {
    meter()
        .u64_counter("habit.transitions")
        .with_description("Number of habit state transitions applied")
        .build()
}

/// Counter: cycle rollovers.
/// Labels: `outcome` ("kept" | "reset").
pub fn cycle_rollovers() -> Counter<u64> {
    meter()
        .u64_counter("habit.cycle.rollovers")
        .with_description("Number of cycle rollovers, by streak outcome")
        .build()
}

/// Counter: boundaries swallowed by missed-fire coalescing.
pub fn coalesced_fires() -> Counter<u64> {
    meter()
        .u64_counter("habit.scheduler.coalesced")
        .with_description("Missed cycle boundaries folded into a single fire")
        .build()
}

/// Counter: scheduler operations.
/// Labels: `operation` ("schedule" | "reschedule" | "cancel" | "fire").
pub fn scheduler_operations() -> Counter<u64> {
    meter()
        .u64_counter("habit.scheduler.operations")
        .with_description("Number of scheduler operations")
        .build()
}

/// Counter: audit records appended.
/// Labels: `category`.
pub fn activity_appends() -> Counter<u64> {
    meter()
        .u64_counter("habit.activity.appends")
        .with_description("Number of activity records appended")
        .build()
}

/// Histogram: engine operation duration in milliseconds.
/// Labels: `operation`.
pub fn operation_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("habit.operation.duration_ms")
        .with_description("Engine operation duration in milliseconds")
        .with_unit("ms")
        .build()
}
