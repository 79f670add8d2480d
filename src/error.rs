//! Error types for habit-tracker.

use thiserror::Error;

use crate::model::habit::HabitId;
use crate::scheduler::JobId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// A habit already owns a live job. Never expected in correct usage.
    #[error("habit {habit_id} already has scheduled job {job_id}")]
    DuplicateJob { habit_id: HabitId, job_id: JobId },

    #[error("scheduled job not found: {0}")]
    JobNotFound(JobId),

    #[error("scheduler is shut down")]
    SchedulerStopped,

    #[error("config error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn habit_not_found(id: HabitId) -> Self {
        Error::NotFound(format!("habit {id}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
