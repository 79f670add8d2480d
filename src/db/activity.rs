//! Append-only activity table.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::Db;
use crate::error::Result;
use crate::model::activity::ActivityRecord;
use crate::model::habit::{HabitId, UserId};
use crate::store::ActivitySink;

#[async_trait::async_trait]
impl ActivitySink for Db {
    async fn append(&self, record: ActivityRecord) -> Result<()> {
        sqlx::query(
            "INSERT INTO activity (category, user_id, habit_id, occurred_at, description)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(record.category.as_str())
        .bind(record.user_id.0)
        .bind(record.habit_id.map(|h| h.0))
        .bind(record.timestamp)
        .bind(&record.description)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn history(
        &self,
        user_id: UserId,
        habit_id: Option<HabitId>,
    ) -> Result<Vec<ActivityRecord>> {
        let rows: Vec<ActivityRow> = sqlx::query_as(
            "SELECT category, user_id, habit_id, occurred_at, description FROM activity
             WHERE user_id = $1 AND ($2::uuid IS NULL OR habit_id = $2)
             ORDER BY occurred_at, seq",
        )
        .bind(user_id.0)
        .bind(habit_id.map(|h| h.0))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(ActivityRow::try_into_record).collect()
    }
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct ActivityRow {
    category: String,
    user_id: i64,
    habit_id: Option<Uuid>,
    occurred_at: DateTime<Utc>,
    description: String,
}

impl ActivityRow {
    fn try_into_record(self) -> Result<ActivityRecord> {
        Ok(ActivityRecord {
            category: self.category.parse()?,
            user_id: UserId(self.user_id),
            habit_id: self.habit_id.map(HabitId),
            timestamp: self.occurred_at,
            description: self.description,
        })
    }
}
