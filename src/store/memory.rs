//! In-process store and sink. Nothing survives the process.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{ActivitySink, HabitStore};
use crate::error::{Error, Result};
use crate::model::activity::ActivityRecord;
use crate::model::habit::{Habit, HabitId, Periodicity, UserId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    habits: RwLock<HashMap<HabitId, Habit>>,
    activity: RwLock<Vec<ActivityRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every record appended so far, in append order.
    pub async fn records(&self) -> Vec<ActivityRecord> {
        self.activity.read().await.clone()
    }
}

#[async_trait::async_trait]
impl HabitStore for MemoryStore {
    async fn load(&self, id: HabitId) -> Result<Habit> {
        self.habits
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::habit_not_found(id))
    }

    async fn save(&self, habit: &Habit) -> Result<()> {
        self.habits.write().await.insert(habit.id, habit.clone());
        Ok(())
    }

    async fn delete(&self, id: HabitId) -> Result<()> {
        self.habits
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| Error::habit_not_found(id))
    }

    async fn list(
        &self,
        user_id: Option<UserId>,
        periodicity: Option<Periodicity>,
    ) -> Result<Vec<Habit>> {
        let habits = self.habits.read().await;
        let mut found: Vec<Habit> = habits
            .values()
            .filter(|h| user_id.is_none_or(|u| h.user_id == u))
            .filter(|h| periodicity.is_none_or(|p| h.periodicity == p))
            .cloned()
            .collect();
        found.sort_by_key(|h| (h.created_at, h.id));
        Ok(found)
    }
}

#[async_trait::async_trait]
impl ActivitySink for MemoryStore {
    async fn append(&self, record: ActivityRecord) -> Result<()> {
        self.activity.write().await.push(record);
        Ok(())
    }

    async fn history(
        &self,
        user_id: UserId,
        habit_id: Option<HabitId>,
    ) -> Result<Vec<ActivityRecord>> {
        let mut records: Vec<ActivityRecord> = self
            .activity
            .read()
            .await
            .iter()
            .filter(|r| r.user_id == user_id)
            .filter(|r| habit_id.is_none_or(|h| r.habit_id == Some(h)))
            .cloned()
            .collect();
        // Stable sort keeps append order for equal timestamps.
        records.sort_by_key(|r| r.timestamp);
        Ok(records)
    }
}
