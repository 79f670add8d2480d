//! Core data model.
//!
//! A habit is something a user wants to do once per cycle. It has identity
//! (id + owner), a periodicity, and its position within the current cycle
//! (completion flag, streaks, next boundary). Activity records are the audit
//! trail of what users did to their habits.

pub mod activity;
pub mod habit;

pub use activity::{ActivityRecord, Category};
pub use habit::{Habit, HabitEdit, HabitId, NewHabit, Periodicity, Phase, UserId};
