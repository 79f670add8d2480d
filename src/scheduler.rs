//! Cycle scheduler: one recurring trigger per habit.
//!
//! Each job runs in its own tokio task that sleeps on the injected [`Clock`]
//! until the job's next fire time, then invokes the job's
//! [`RolloverHandler`]. The job table is the single source of truth: a task
//! only fires if, under the table lock, its job still exists and is due.
//! That is what makes `reschedule` and `cancel` take effect immediately: once
//! they return, no fire based on the old entry can start. A fire that already
//! started runs to completion.
//!
//! Missed boundaries coalesce. If the task wakes long after its fire time
//! (suspended process, catch-up after restart) it fires once, reports how
//! many boundaries were swallowed, and measures the next fire from now.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::model::habit::HabitId;
use crate::telemetry::metrics;

/// Opaque handle for a scheduled job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// One invocation of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fire {
    pub job_id: JobId,
    pub habit_id: HabitId,
    /// When the job was due.
    pub scheduled_for: DateTime<Utc>,
    /// When it actually fired.
    pub fired_at: DateTime<Utc>,
    /// Further boundaries that passed before the fire and were folded into it.
    pub coalesced: u32,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledJob {
    pub job_id: JobId,
    pub habit_id: HabitId,
    pub interval: TimeDelta,
    pub next_fire: DateTime<Utc>,
}

/// Callback invoked at each fire. Errors are the handler's to report.
#[async_trait::async_trait]
pub trait RolloverHandler: Send + Sync {
    async fn on_fire(&self, fire: Fire);
}

struct Job {
    habit_id: HabitId,
    interval: TimeDelta,
    next_fire: DateTime<Utc>,
    wake: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl Job {
    fn snapshot(&self, job_id: JobId) -> ScheduledJob {
        ScheduledJob {
            job_id,
            habit_id: self.habit_id,
            interval: self.interval,
            next_fire: self.next_fire,
        }
    }
}

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    by_habit: HashMap<HabitId, JobId>,
    stopped: bool,
}

impl JobTable {
    fn remove(&mut self, job_id: JobId) -> Option<Job> {
        let job = self.jobs.remove(&job_id)?;
        if self.by_habit.get(&job.habit_id) == Some(&job_id) {
            self.by_habit.remove(&job.habit_id);
        }
        Some(job)
    }
}

struct Shared {
    table: Mutex<JobTable>,
    clock: Arc<dyn Clock>,
}

/// What a woken task should do next.
enum Due {
    Fire(Fire),
    NotYet,
    Gone,
}

/// The scheduler. Cheap to clone; clones share the same job table.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                table: Mutex::new(JobTable::default()),
                clock,
            }),
        }
    }

    /// Register a recurring job for `habit_id`, first firing at `first_run_at`.
    pub async fn schedule(
        &self,
        habit_id: HabitId,
        first_run_at: DateTime<Utc>,
        interval: TimeDelta,
        handler: Arc<dyn RolloverHandler>,
    ) -> Result<JobId> {
        validate_interval(interval)?;

        let mut table = self.shared.table.lock().await;
        if table.stopped {
            return Err(Error::SchedulerStopped);
        }
        if let Some(&job_id) = table.by_habit.get(&habit_id) {
            return Err(Error::DuplicateJob { habit_id, job_id });
        }

        let job_id = JobId::new();
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(run_job(
            Arc::clone(&self.shared),
            job_id,
            Arc::clone(&wake),
            handler,
        ));

        table.jobs.insert(
            job_id,
            Job {
                habit_id,
                interval,
                next_fire: first_run_at,
                wake,
                task: Some(task),
            },
        );
        table.by_habit.insert(habit_id, job_id);

        metrics::scheduler_operations().add(1, &[KeyValue::new("operation", "schedule")]);
        debug!(
            %habit_id,
            %job_id,
            %first_run_at,
            interval_secs = interval.num_seconds(),
            "job scheduled"
        );
        Ok(job_id)
    }

    /// Replace a job's interval and next fire time.
    pub async fn reschedule(
        &self,
        job_id: JobId,
        interval: TimeDelta,
        first_run_at: DateTime<Utc>,
    ) -> Result<()> {
        validate_interval(interval)?;

        let mut table = self.shared.table.lock().await;
        let job = table
            .jobs
            .get_mut(&job_id)
            .ok_or(Error::JobNotFound(job_id))?;
        job.interval = interval;
        job.next_fire = first_run_at;
        job.wake.notify_one();

        metrics::scheduler_operations().add(1, &[KeyValue::new("operation", "reschedule")]);
        debug!(
            %job_id,
            next_fire = %first_run_at,
            interval_secs = interval.num_seconds(),
            "job rescheduled"
        );
        Ok(())
    }

    /// Remove a job. Returns whether a live job was removed; cancelling an
    /// unknown or already-cancelled job is a no-op.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let mut table = self.shared.table.lock().await;
        let Some(job) = table.remove(job_id) else {
            return false;
        };
        job.wake.notify_one();

        metrics::scheduler_operations().add(1, &[KeyValue::new("operation", "cancel")]);
        debug!(%job_id, habit_id = %job.habit_id, "job cancelled");
        true
    }

    /// Cancel whichever job `habit_id` currently owns.
    pub async fn cancel_habit(&self, habit_id: HabitId) -> bool {
        let job_id = {
            let table = self.shared.table.lock().await;
            table.by_habit.get(&habit_id).copied()
        };
        match job_id {
            Some(job_id) => self.cancel(job_id).await,
            None => false,
        }
    }

    pub async fn job(&self, job_id: JobId) -> Option<ScheduledJob> {
        let table = self.shared.table.lock().await;
        table.jobs.get(&job_id).map(|job| job.snapshot(job_id))
    }

    pub async fn job_for(&self, habit_id: HabitId) -> Option<ScheduledJob> {
        let table = self.shared.table.lock().await;
        let job_id = *table.by_habit.get(&habit_id)?;
        table.jobs.get(&job_id).map(|job| job.snapshot(job_id))
    }

    pub async fn jobs(&self) -> Vec<ScheduledJob> {
        let table = self.shared.table.lock().await;
        table
            .jobs
            .iter()
            .map(|(&job_id, job)| job.snapshot(job_id))
            .collect()
    }

    /// Stop accepting jobs, cancel every job, and wait for the job tasks to
    /// exit. A fire already in progress finishes first.
    pub async fn shutdown(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut table = self.shared.table.lock().await;
            table.stopped = true;
            table.by_habit.clear();
            table
                .jobs
                .drain()
                .filter_map(|(_, mut job)| {
                    job.wake.notify_one();
                    job.task.take()
                })
                .collect()
        };

        let count = tasks.len();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("scheduler job task ended abnormally: {e}");
            }
        }
        info!(jobs = count, "scheduler stopped");
    }
}

fn validate_interval(interval: TimeDelta) -> Result<()> {
    if interval <= TimeDelta::zero() {
        return Err(Error::validation(
            "interval",
            format!("must be positive, got {}s", interval.num_seconds()),
        ));
    }
    Ok(())
}

async fn run_job(
    shared: Arc<Shared>,
    job_id: JobId,
    wake: Arc<Notify>,
    handler: Arc<dyn RolloverHandler>,
) {
    loop {
        let next_fire = {
            let table = shared.table.lock().await;
            match table.jobs.get(&job_id) {
                Some(job) => job.next_fire,
                None => break,
            }
        };

        tokio::select! {
            _ = shared.clock.sleep_until(next_fire) => {}
            _ = wake.notified() => continue,
        }

        match claim_fire(&shared, job_id).await {
            Due::Fire(fire) => {
                metrics::scheduler_operations().add(1, &[KeyValue::new("operation", "fire")]);
                if fire.coalesced > 0 {
                    metrics::coalesced_fires().add(u64::from(fire.coalesced), &[]);
                    info!(
                        %job_id,
                        habit_id = %fire.habit_id,
                        coalesced = fire.coalesced,
                        "missed boundaries coalesced into one fire"
                    );
                }
                handler.on_fire(fire).await;
            }
            Due::NotYet => continue,
            Due::Gone => break,
        }
    }
    debug!(%job_id, "job task exited");
}

/// Decide, under the table lock, whether the job fires now. Advances the
/// job's next fire time before releasing the lock.
async fn claim_fire(shared: &Shared, job_id: JobId) -> Due {
    let mut table = shared.table.lock().await;
    let Some(job) = table.jobs.get_mut(&job_id) else {
        return Due::Gone;
    };

    let now = shared.clock.now();
    if now < job.next_fire {
        return Due::NotYet;
    }

    let scheduled_for = job.next_fire;
    let overdue = now - scheduled_for;
    let coalesced = u32::try_from(overdue.num_seconds() / job.interval.num_seconds().max(1))
        .unwrap_or(u32::MAX);
    job.next_fire = now + job.interval;

    Due::Fire(Fire {
        job_id,
        habit_id: job.habit_id,
        scheduled_for,
        fired_at: now,
        coalesced,
    })
}
