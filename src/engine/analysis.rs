//! Read-side queries over a user's habits.
//!
//! Queries never change habit state, but each one is an explicit user action
//! and so appends its own activity record.

use tracing::debug;

use super::habits::HabitEngine;
use crate::error::{Error, Result};
use crate::model::activity::{ActivityRecord, Category};
use crate::model::habit::{Habit, HabitId, Periodicity, UserId};

impl HabitEngine {
    /// Fetch a habit for display.
    pub async fn show(&self, id: HabitId) -> Result<Habit> {
        let habit = self.get(id).await?;
        self.audit(ActivityRecord::habit(
            Category::DisplayedHabit,
            habit.user_id,
            habit.id,
            self.now(),
        ))
        .await?;
        Ok(habit)
    }

    /// The user's habits, oldest first. `periodicity` is parsed like on
    /// create, so an unknown value is a validation error.
    pub async fn list_habits(
        &self,
        user_id: UserId,
        periodicity: Option<&str>,
    ) -> Result<Vec<Habit>> {
        let filter = periodicity.map(str::parse::<Periodicity>).transpose()?;
        let habits = self.core.store.list(Some(user_id), filter).await?;

        let now = self.now();
        let record = match filter {
            Some(p) => ActivityRecord::periodicity(
                Category::DisplayedHabitsWithPeriodicity,
                user_id,
                p,
                now,
            ),
            None => ActivityRecord::user(Category::DisplayedHabits, user_id, now),
        };
        self.audit(record).await?;

        debug!(%user_id, count = habits.len(), "listed habits");
        Ok(habits)
    }

    /// Longest streak ever reached on one of the user's habits.
    pub async fn longest_streak_of(&self, user_id: UserId, id: HabitId) -> Result<u32> {
        let habit = self.owned(user_id, id).await?;
        self.audit(ActivityRecord::habit(
            Category::DisplayedTheLongestStreakOfHabit,
            user_id,
            id,
            self.now(),
        ))
        .await?;
        Ok(habit.longest_streak)
    }

    /// Every habit of the user tied for the highest longest streak.
    pub async fn habits_with_longest_streak(&self, user_id: UserId) -> Result<Vec<Habit>> {
        let habits = self.core.store.list(Some(user_id), None).await?;
        let best = habits.iter().map(|h| h.longest_streak).max();
        let leaders: Vec<Habit> = habits
            .into_iter()
            .filter(|h| Some(h.longest_streak) == best)
            .collect();

        self.audit(ActivityRecord::user(
            Category::DisplayedTheHabitWithTheLongestStreak,
            user_id,
            self.now(),
        ))
        .await?;
        Ok(leaders)
    }

    /// The user's audit trail for one habit, oldest first. The record of this
    /// query is appended after the history is read, so it is not included.
    pub async fn activity_on_habit(
        &self,
        user_id: UserId,
        id: HabitId,
    ) -> Result<Vec<ActivityRecord>> {
        let history = self.core.sink.history(user_id, Some(id)).await?;
        self.audit(ActivityRecord::habit(
            Category::DisplayedActivityOnHabit,
            user_id,
            id,
            self.now(),
        ))
        .await?;
        Ok(history)
    }

    async fn owned(&self, user_id: UserId, id: HabitId) -> Result<Habit> {
        let habit = self.get(id).await?;
        if habit.user_id != user_id {
            return Err(Error::habit_not_found(id));
        }
        Ok(habit)
    }
}
