//! Audit trail entries.
//!
//! Every explicit action on a habit (and every analysis query) appends one
//! record. Records are immutable once written; the description is rendered
//! at construction time so sinks can store it verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::habit::{HabitId, Periodicity, UserId};
use crate::error::{Error, Result};

/// What the user did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    // habit actions
    CreatedHabit,
    DisplayedHabit,
    ChangedTheNameOfHabit,
    ChangedTheDescriptionOfHabit,
    ChangedThePeriodicityOfHabit,
    CompletedHabit,
    DeletedHabit,

    // analysis queries
    DisplayedHabits,
    DisplayedHabitsWithPeriodicity,
    DisplayedTheLongestStreakOfHabit,
    DisplayedTheHabitWithTheLongestStreak,
    DisplayedActivityOnHabit,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::CreatedHabit => "created_habit",
            Category::DisplayedHabit => "displayed_habit",
            Category::ChangedTheNameOfHabit => "changed_the_name_of_habit",
            Category::ChangedTheDescriptionOfHabit => "changed_the_description_of_habit",
            Category::ChangedThePeriodicityOfHabit => "changed_the_periodicity_of_habit",
            Category::CompletedHabit => "completed_habit",
            Category::DeletedHabit => "deleted_habit",
            Category::DisplayedHabits => "displayed_habits",
            Category::DisplayedHabitsWithPeriodicity => "displayed_habits_with_periodicity",
            Category::DisplayedTheLongestStreakOfHabit => "displayed_the_longest_streak_of_habit",
            Category::DisplayedTheHabitWithTheLongestStreak => {
                "displayed_the_habit_with_the_longest_streak"
            }
            Category::DisplayedActivityOnHabit => "displayed_activity_on_habit",
        }
    }

    /// Category name as prose, e.g. "changed the name of habit".
    pub fn phrase(self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let all = [
            Category::CreatedHabit,
            Category::DisplayedHabit,
            Category::ChangedTheNameOfHabit,
            Category::ChangedTheDescriptionOfHabit,
            Category::ChangedThePeriodicityOfHabit,
            Category::CompletedHabit,
            Category::DeletedHabit,
            Category::DisplayedHabits,
            Category::DisplayedHabitsWithPeriodicity,
            Category::DisplayedTheLongestStreakOfHabit,
            Category::DisplayedTheHabitWithTheLongestStreak,
            Category::DisplayedActivityOnHabit,
        ];
        all.into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| Error::validation("category", format!("unknown category '{s}'")))
    }
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub category: Category,
    pub user_id: UserId,
    pub habit_id: Option<HabitId>,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl ActivityRecord {
    /// Record an action on a specific habit.
    pub fn habit(
        category: Category,
        user_id: UserId,
        habit_id: HabitId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let description = format!(
            "User {user_id} {} {} at {}",
            category.phrase(),
            habit_id.0,
            stamp(timestamp)
        );
        Self {
            category,
            user_id,
            habit_id: Some(habit_id),
            timestamp,
            description,
        }
    }

    /// Record a user-level action that touches no single habit.
    pub fn user(category: Category, user_id: UserId, timestamp: DateTime<Utc>) -> Self {
        let description = format!("User {user_id} {} at {}", category.phrase(), stamp(timestamp));
        Self {
            category,
            user_id,
            habit_id: None,
            timestamp,
            description,
        }
    }

    /// Record a listing filtered by periodicity.
    pub fn periodicity(
        category: Category,
        user_id: UserId,
        periodicity: Periodicity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let description = format!(
            "User {user_id} {} '{periodicity}' at {}",
            category.phrase(),
            stamp(timestamp)
        );
        Self {
            category,
            user_id,
            habit_id: None,
            timestamp,
            description,
        }
    }
}

fn stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}
