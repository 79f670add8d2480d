//! Habit rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};
use tokio::sync::OwnedSemaphorePermit;
use uuid::Uuid;

use super::Db;
use crate::error::{Error, Result};
use crate::model::habit::{Habit, HabitId, Periodicity, UserId};
use crate::scheduler::JobId;
use crate::store::{HabitLease, HabitStore};

const COLUMNS: &str = "id, user_id, name, description, periodicity, created_at, is_completed, \
     last_completion_time, next_cycle_start, current_streak, longest_streak, scheduled_job_id";

impl Db {
    /// Ids of habits whose UUID starts with `prefix`, for short-id lookup.
    pub async fn habit_ids_with_prefix(&self, prefix: &str) -> Result<Vec<HabitId>> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT id FROM habits WHERE id::text LIKE $1 || '%' ORDER BY created_at LIMIT 10",
        )
        .bind(prefix.to_ascii_lowercase())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(id,)| HabitId(id)).collect())
    }
}

/// A transaction-scoped advisory lock on one habit. Commit or rollback
/// (including the rollback on drop) releases it.
struct AdvisoryLease {
    tx: Transaction<'static, Postgres>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait::async_trait]
impl HabitLease for AdvisoryLease {
    async fn release(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl HabitStore for Db {
    async fn lease(&self, id: HabitId) -> Result<Box<dyn HabitLease>> {
        let permit = Arc::clone(self.leases())
            .acquire_owned()
            .await
            .map_err(|_| Error::Other("lease pool closed".to_string()))?;

        let mut tx = self.pool().begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(id.0.to_string())
            .execute(&mut *tx)
            .await?;

        Ok(Box::new(AdvisoryLease {
            tx,
            _permit: permit,
        }))
    }

    async fn load(&self, id: HabitId) -> Result<Habit> {
        let row: Option<HabitRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM habits WHERE id = $1"))
                .bind(id.0)
                .fetch_optional(self.pool())
                .await?;

        row.ok_or_else(|| Error::habit_not_found(id))?
            .try_into_habit()
    }

    async fn save(&self, habit: &Habit) -> Result<()> {
        sqlx::query(
            "INSERT INTO habits (id, user_id, name, description, periodicity, created_at, is_completed, last_completion_time, next_cycle_start, current_streak, longest_streak, scheduled_job_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                periodicity = EXCLUDED.periodicity,
                is_completed = EXCLUDED.is_completed,
                last_completion_time = EXCLUDED.last_completion_time,
                next_cycle_start = EXCLUDED.next_cycle_start,
                current_streak = EXCLUDED.current_streak,
                longest_streak = EXCLUDED.longest_streak,
                scheduled_job_id = EXCLUDED.scheduled_job_id",
        )
        .bind(habit.id.0)
        .bind(habit.user_id.0)
        .bind(&habit.name)
        .bind(&habit.description)
        .bind(habit.periodicity.to_string())
        .bind(habit.created_at)
        .bind(habit.is_completed)
        .bind(habit.last_completion_time)
        .bind(habit.next_cycle_start)
        .bind(streak_column(habit.current_streak)?)
        .bind(streak_column(habit.longest_streak)?)
        .bind(habit.scheduled_job_id.map(|j| j.0))
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete(&self, id: HabitId) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM habits WHERE id = $1")
            .bind(id.0)
            .execute(self.pool())
            .await?
            .rows_affected();

        if rows_affected == 0 {
            return Err(Error::habit_not_found(id));
        }
        Ok(())
    }

    async fn list(
        &self,
        user_id: Option<UserId>,
        periodicity: Option<Periodicity>,
    ) -> Result<Vec<Habit>> {
        let rows: Vec<HabitRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM habits
             WHERE ($1::bigint IS NULL OR user_id = $1)
               AND ($2::text IS NULL OR periodicity = $2)
             ORDER BY created_at, id"
        ))
        .bind(user_id.map(|u| u.0))
        .bind(periodicity.map(|p| p.to_string()))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(HabitRow::try_into_habit).collect()
    }
}

fn streak_column(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::validation("streak", format!("{value} out of range")))
}

/// Internal row type for sqlx::FromRow.
#[derive(sqlx::FromRow)]
struct HabitRow {
    id: Uuid,
    user_id: i64,
    name: String,
    description: String,
    periodicity: String,
    created_at: DateTime<Utc>,
    is_completed: bool,
    last_completion_time: Option<DateTime<Utc>>,
    next_cycle_start: DateTime<Utc>,
    current_streak: i32,
    longest_streak: i32,
    scheduled_job_id: Option<Uuid>,
}

impl HabitRow {
    fn try_into_habit(self) -> Result<Habit> {
        let id = self.id;
        let streak = |v: i32| {
            u32::try_from(v).map_err(|_| Error::Other(format!("habit {id}: negative streak {v}")))
        };

        Ok(Habit {
            id: HabitId(id),
            user_id: UserId(self.user_id),
            current_streak: streak(self.current_streak)?,
            longest_streak: streak(self.longest_streak)?,
            name: self.name,
            description: self.description,
            periodicity: self.periodicity.parse()?,
            created_at: self.created_at,
            is_completed: self.is_completed,
            last_completion_time: self.last_completion_time,
            next_cycle_start: self.next_cycle_start,
            scheduled_job_id: self.scheduled_job_id.map(JobId),
        })
    }
}
