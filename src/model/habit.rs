//! Habit entity and its value types.

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scheduler::JobId;
use crate::streak::Streak;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Newtype for habit IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HabitId(pub Uuid);

impl HabitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HabitId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for HabitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short display: first 8 chars of UUID
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// Owning user. Authentication lives outside this crate; we only carry the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Periodicity
// ---------------------------------------------------------------------------

/// How often a habit must be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Periodicity {
    Daily,
    Weekly,
}

impl Periodicity {
    /// Cycle length in whole days.
    pub fn days(self) -> i64 {
        match self {
            Periodicity::Daily => 1,
            Periodicity::Weekly => 7,
        }
    }

    pub fn interval(self) -> TimeDelta {
        TimeDelta::days(self.days())
    }

    /// The cycle boundary for a cycle anchored at `at`: midnight (UTC) of
    /// `at`'s date plus one cycle length.
    pub fn boundary_after(self, at: DateTime<Utc>) -> DateTime<Utc> {
        at.date_naive().and_time(NaiveTime::MIN).and_utc() + self.interval()
    }
}

impl std::fmt::Display for Periodicity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Periodicity::Daily => "daily",
            Periodicity::Weekly => "weekly",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Periodicity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(Periodicity::Daily),
            "weekly" => Ok(Periodicity::Weekly),
            other => Err(Error::validation(
                "periodicity",
                format!("'{other}' (expected daily or weekly)"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Habit
// ---------------------------------------------------------------------------

/// A tracked habit and its position in the current cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub user_id: UserId,
    pub name: String,
    pub description: String,
    pub periodicity: Periodicity,
    pub created_at: DateTime<Utc>,

    /// The current cycle has already been satisfied.
    pub is_completed: bool,

    /// Most recent completion that changed state. `None` means never.
    pub last_completion_time: Option<DateTime<Utc>>,

    /// When the current cycle ends and the rollover fires.
    pub next_cycle_start: DateTime<Utc>,

    pub current_streak: u32,
    pub longest_streak: u32,

    /// Handle of the scheduler job driving this habit's rollovers. Handles
    /// loaded from storage may belong to an earlier process until the engine
    /// reconciles them.
    pub scheduled_job_id: Option<JobId>,
}

/// Where a habit sits within its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Completed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phase::Pending => "pending",
            Phase::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl Habit {
    pub fn phase(&self) -> Phase {
        if self.is_completed {
            Phase::Completed
        } else {
            Phase::Pending
        }
    }

    pub fn streak(&self) -> Streak {
        Streak {
            is_completed: self.is_completed,
            current: self.current_streak,
            longest: self.longest_streak,
        }
    }

    pub(crate) fn set_streak(&mut self, streak: Streak) {
        self.is_completed = streak.is_completed;
        self.current_streak = streak.current;
        self.longest_streak = streak.longest;
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// Request to create a habit. Periodicity stays a raw string until the
/// engine validates it.
#[derive(Debug, Clone)]
pub struct NewHabit {
    pub(crate) user_id: UserId,
    pub(crate) name: String,
    pub(crate) periodicity: String,
    pub(crate) description: Option<String>,
}

impl NewHabit {
    pub fn new(user_id: UserId, name: impl Into<String>, periodicity: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            periodicity: periodicity.into(),
            description: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update. Absent or empty fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct HabitEdit {
    pub(crate) name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) periodicity: Option<String>,
}

impl HabitEdit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn periodicity(mut self, periodicity: impl Into<String>) -> Self {
        self.periodicity = Some(periodicity.into());
        self
    }
}
