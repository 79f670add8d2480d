//! Habit engine: serialized per-habit operations, scheduler-driven cycle
//! rollovers, reconciliation with storage, and analysis queries.

pub mod analysis;
pub mod habits;
mod locks;

pub use habits::{EditOutcome, HabitEngine, ReconcileReport};
