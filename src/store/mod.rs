//! Storage seams: where habits live and where the audit trail goes.
//!
//! The engine only talks to these traits. [`MemoryStore`] backs tests and
//! demos; [`crate::db::Db`] implements both against Postgres.

pub mod memory;

pub use memory::MemoryStore;

use crate::error::Result;
use crate::model::activity::ActivityRecord;
use crate::model::habit::{Habit, HabitId, Periodicity, UserId};

/// A hold on one habit, shared with every process using the same store.
/// Dropping a lease also gives it up; `release` does so without waiting for
/// the drop to be noticed.
#[async_trait::async_trait]
pub trait HabitLease: Send {
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Lease for stores that only one process touches. The engine's own
/// per-habit locks already serialize those.
pub struct LocalLease;

#[async_trait::async_trait]
impl HabitLease for LocalLease {
    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait::async_trait]
pub trait HabitStore: Send + Sync {
    /// Hold `id` against other processes until the lease is released. Taken
    /// around every load, change, save sequence.
    async fn lease(&self, _id: HabitId) -> Result<Box<dyn HabitLease>> {
        Ok(Box::new(LocalLease))
    }

    /// Fetch a habit. `Error::NotFound` if it does not exist.
    async fn load(&self, id: HabitId) -> Result<Habit>;

    /// Insert or replace.
    async fn save(&self, habit: &Habit) -> Result<()>;

    /// Remove a habit. `Error::NotFound` if it does not exist.
    async fn delete(&self, id: HabitId) -> Result<()>;

    /// List habits, oldest first, optionally filtered by owner and periodicity.
    async fn list(
        &self,
        user_id: Option<UserId>,
        periodicity: Option<Periodicity>,
    ) -> Result<Vec<Habit>>;
}

#[async_trait::async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append(&self, record: ActivityRecord) -> Result<()>;

    /// A user's records in timestamp order (insertion order on ties),
    /// optionally limited to one habit.
    async fn history(
        &self,
        user_id: UserId,
        habit_id: Option<HabitId>,
    ) -> Result<Vec<ActivityRecord>>;
}
