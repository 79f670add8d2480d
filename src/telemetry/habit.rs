//! Span helpers for habit operations.

use tracing::Span;

use crate::model::habit::HabitId;

/// Start a span for one engine operation on a habit.
///
/// `habit.phase` is declared empty and filled in by [`record_transition`].
pub fn start_habit_span(operation: &str, habit_id: HabitId) -> Span {
    tracing::info_span!(
        "habit.operation",
        "habit.operation" = operation,
        "habit.id" = %habit_id.0,
        "habit.phase" = tracing::field::Empty,
    )
}

/// Record a phase change on the span and emit it as an event.
pub fn record_transition(span: &Span, from: &str, to: &str) {
    span.record("habit.phase", to);
    span.in_scope(|| {
        tracing::info!(from = from, to = to, "state_transition");
    });
}
