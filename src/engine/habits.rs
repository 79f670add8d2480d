//! Habit engine: applies lifecycle transitions against the store, the
//! scheduler, and the audit trail.
//!
//! User operations and scheduler rollovers both come through here and both
//! hold the habit's lock for the whole load, transition, apply sequence. The
//! lock is per process; the store's lease on the habit extends it to other
//! processes sharing the same store, such as the CLI next to the daemon.
//! Effects are applied in the order the transition lists them, so an audit
//! record is only appended once the change it describes has been saved.

use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Instant;

use chrono::{DateTime, TimeDelta, Utc};
use opentelemetry::KeyValue;
use tracing::{Instrument, debug, error, info, warn};

use super::locks::HabitLocks;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::lifecycle::{Edited, Effect, EditField, Rejection, Transition};
use crate::model::activity::ActivityRecord;
use crate::model::habit::{Habit, HabitEdit, HabitId, NewHabit};
use crate::scheduler::{Fire, JobId, RolloverHandler, Scheduler};
use crate::store::{ActivitySink, HabitStore};
use crate::streak::Credit;
use crate::telemetry::habit::{record_transition, start_habit_span};
use crate::telemetry::metrics;

pub(crate) struct Core {
    pub(crate) store: Arc<dyn HabitStore>,
    pub(crate) sink: Arc<dyn ActivitySink>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) scheduler: Scheduler,
    pub(crate) locks: HabitLocks,
}

/// The habit engine. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct HabitEngine {
    pub(crate) core: Arc<Core>,
}

/// What an edit did.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub habit: Habit,
    pub changed: Vec<EditField>,
    pub rejected: Vec<Rejection>,
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Habits that had no job in this process and got one.
    pub scheduled: usize,
    /// Jobs moved to match their habit's boundary or interval.
    pub rescheduled: usize,
    /// Jobs whose habit no longer exists.
    pub cancelled: usize,
}

/// Scheduler callback. Holds the engine weakly so the scheduler's job table
/// does not keep the engine alive.
struct RolloverDriver {
    core: Weak<Core>,
}

#[async_trait::async_trait]
impl RolloverHandler for RolloverDriver {
    async fn on_fire(&self, fire: Fire) {
        let Some(core) = self.core.upgrade() else {
            debug!(habit_id = %fire.habit_id, "engine gone, fire dropped");
            return;
        };
        let engine = HabitEngine { core };
        if let Err(e) = engine.rollover(fire).await {
            error!(habit_id = %fire.habit_id, job_id = %fire.job_id, "rollover failed: {e}");
        }
    }
}

impl HabitEngine {
    pub fn new(
        store: Arc<dyn HabitStore>,
        sink: Arc<dyn ActivitySink>,
        clock: Arc<dyn Clock>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            core: Arc::new(Core {
                store,
                sink,
                clock,
                scheduler,
                locks: HabitLocks::default(),
            }),
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.core.scheduler
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.core.clock.now()
    }

    /// Fetch a habit without recording anything.
    pub async fn get(&self, id: HabitId) -> Result<Habit> {
        self.core.store.load(id).await
    }

    /// Create a habit and start its cycle timer.
    pub async fn create(&self, new: NewHabit) -> Result<Habit> {
        let started = Instant::now();
        let transition = Habit::create(&new, self.now())?;
        let id = transition.habit.id;
        let span = start_habit_span("create", id);

        async {
            let _guard = self.core.locks.acquire(id).await;
            let habit = self.apply("create", transition).await?;

            record_transition(&span, "none", &habit.phase().to_string());
            info!(
                %id,
                user_id = %habit.user_id,
                periodicity = %habit.periodicity,
                next_cycle_start = %habit.next_cycle_start,
                "habit created"
            );
            observe("create", started);
            Ok(habit)
        }
        .instrument(span.clone())
        .await
    }

    /// Mark the current cycle done. `at` defaults to the clock.
    pub async fn complete(&self, id: HabitId, at: Option<DateTime<Utc>>) -> Result<Habit> {
        let started = Instant::now();
        let span = start_habit_span("complete", id);

        async {
            let _guard = self.core.locks.acquire(id).await;
            let lease = self.core.store.lease(id).await?;
            let habit = self.core.store.load(id).await?;
            let at = at.unwrap_or_else(|| self.now());
            let from = habit.phase();

            let (transition, credit) = habit.complete(at);
            let habit = self.apply("complete", transition).await?;
            lease.release().await?;

            match credit {
                Credit::OnTime => {}
                Credit::Late => info!(
                    %id,
                    boundary = %habit.next_cycle_start,
                    "completion after boundary credited to the open cycle"
                ),
                Credit::AlreadyCompleted => debug!(%id, "cycle already completed"),
            }
            record_transition(&span, &from.to_string(), &habit.phase().to_string());
            observe("complete", started);
            Ok(habit)
        }
        .instrument(span.clone())
        .await
    }

    /// Apply a partial update. Rejected fields are reported, not fatal.
    pub async fn edit(&self, id: HabitId, edit: HabitEdit) -> Result<EditOutcome> {
        let started = Instant::now();
        let span = start_habit_span("edit", id);

        async {
            let _guard = self.core.locks.acquire(id).await;
            let lease = self.core.store.lease(id).await?;
            let habit = self.core.store.load(id).await?;

            let Edited {
                transition,
                changed,
                rejected,
            } = habit.edit(&edit, self.now());
            for rejection in &rejected {
                warn!(
                    %id,
                    field = %rejection.field,
                    reason = %rejection.reason,
                    "edit rejected, field left unchanged"
                );
            }

            let habit = self.apply("edit", transition).await?;
            lease.release().await?;
            if !changed.is_empty() {
                info!(%id, ?changed, "habit edited");
            }
            observe("edit", started);
            Ok(EditOutcome {
                habit,
                changed,
                rejected,
            })
        }
        .instrument(span.clone())
        .await
    }

    /// Cancel the habit's job, then remove it.
    pub async fn delete(&self, id: HabitId) -> Result<()> {
        let started = Instant::now();
        let span = start_habit_span("delete", id);

        async {
            let guard = self.core.locks.acquire(id).await;
            let lease = self.core.store.lease(id).await?;
            let habit = self.core.store.load(id).await?;
            let from = habit.phase();

            self.apply("delete", habit.delete(self.now())).await?;
            lease.release().await?;

            drop(guard);
            self.core.locks.forget(id).await;
            record_transition(&span, &from.to_string(), "deleted");
            info!(%id, "habit deleted");
            observe("delete", started);
            Ok(())
        }
        .instrument(span.clone())
        .await
    }

    /// Close a cycle on behalf of the scheduler. A fire for a habit that no
    /// longer exists cancels its job and is otherwise ignored.
    pub(crate) async fn rollover(&self, fire: Fire) -> Result<()> {
        let started = Instant::now();
        let span = start_habit_span("rollover", fire.habit_id);

        async {
            let _guard = self.core.locks.acquire(fire.habit_id).await;
            let lease = self.core.store.lease(fire.habit_id).await?;
            let habit = match self.core.store.load(fire.habit_id).await {
                Ok(habit) => habit,
                Err(Error::NotFound(_)) => {
                    self.core.scheduler.cancel(fire.job_id).await;
                    debug!(habit_id = %fire.habit_id, "fire for removed habit discarded");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if habit.next_cycle_start > fire.fired_at {
                // The boundary moved after this fire was claimed, and the
                // change that moved it closed the ended cycle. Re-aim the job
                // at the boundary the habit actually has.
                debug!(
                    habit_id = %habit.id,
                    boundary = %habit.next_cycle_start,
                    fired_at = %fire.fired_at,
                    "stale fire discarded"
                );
                let interval = habit.periodicity.interval();
                return match self
                    .core
                    .scheduler
                    .reschedule(fire.job_id, interval, habit.next_cycle_start)
                    .await
                {
                    Ok(()) | Err(Error::JobNotFound(_)) => Ok(()),
                    Err(e) => Err(e),
                };
            }
            let from = habit.phase();

            let (transition, before) = habit.rollover(&fire);
            let habit = self.apply("rollover", transition).await?;
            lease.release().await?;

            let outcome = if before.is_completed { "kept" } else { "reset" };
            metrics::cycle_rollovers().add(1, &[KeyValue::new("outcome", outcome)]);
            record_transition(&span, &from.to_string(), &habit.phase().to_string());
            info!(
                habit_id = %habit.id,
                outcome,
                current_streak = habit.current_streak,
                longest_streak = habit.longest_streak,
                next_cycle_start = %habit.next_cycle_start,
                coalesced = fire.coalesced,
                "cycle rolled over"
            );
            observe("rollover", started);
            Ok(())
        }
        .instrument(span.clone())
        .await
    }

    /// Align this process's scheduler with the store.
    ///
    /// Every stored habit gets exactly one local job, first firing at its
    /// stored boundary; a boundary that passed while nothing was running
    /// fires once, immediately. Jobs whose boundary or interval drifted from
    /// a still-future habit boundary are moved. Jobs of removed habits are
    /// cancelled.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let now = self.now();
        let mut report = ReconcileReport::default();
        let mut live = HashSet::new();

        for listed in self.core.store.list(None, None).await? {
            let id = listed.id;
            let _guard = self.core.locks.acquire(id).await;
            let lease = self.core.store.lease(id).await?;
            let mut habit = match self.core.store.load(id).await {
                Ok(habit) => habit,
                Err(Error::NotFound(_)) => continue,
                Err(e) => return Err(e),
            };
            live.insert(id);

            let interval = habit.periodicity.interval();
            let job_id = match self.core.scheduler.job_for(id).await {
                None => {
                    report.scheduled += 1;
                    self.core
                        .scheduler
                        .schedule(id, habit.next_cycle_start, interval, self.driver())
                        .await?
                }
                Some(job) => {
                    let drifted =
                        job.interval != interval || job.next_fire != habit.next_cycle_start;
                    // A boundary in the past means a rollover is due or in
                    // flight; leave the job alone.
                    if drifted && habit.next_cycle_start > now {
                        self.core
                            .scheduler
                            .reschedule(job.job_id, interval, habit.next_cycle_start)
                            .await?;
                        report.rescheduled += 1;
                    }
                    job.job_id
                }
            };

            if habit.scheduled_job_id != Some(job_id) {
                habit.scheduled_job_id = Some(job_id);
                self.core.store.save(&habit).await?;
            }
            lease.release().await?;
        }

        for job in self.core.scheduler.jobs().await {
            if live.contains(&job.habit_id) {
                continue;
            }
            let _guard = self.core.locks.acquire(job.habit_id).await;
            match self.core.store.load(job.habit_id).await {
                Ok(_) => {}
                Err(Error::NotFound(_)) => {
                    if self.core.scheduler.cancel(job.job_id).await {
                        report.cancelled += 1;
                    }
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            scheduled = report.scheduled,
            rescheduled = report.rescheduled,
            cancelled = report.cancelled,
            "reconciled scheduler with store"
        );
        Ok(report)
    }

    /// Drain and stop the scheduler. Rollovers already running finish first.
    pub async fn shutdown(&self) {
        self.core.scheduler.shutdown().await;
    }

    fn driver(&self) -> Arc<dyn RolloverHandler> {
        Arc::new(RolloverDriver {
            core: Arc::downgrade(&self.core),
        })
    }

    pub(crate) async fn audit(&self, record: ActivityRecord) -> Result<()> {
        let category = record.category;
        self.core.sink.append(record).await?;
        metrics::activity_appends().add(1, &[KeyValue::new("category", category.as_str())]);
        Ok(())
    }

    /// Carry out a transition's effects in order. Must be called with the
    /// habit's lock held.
    async fn apply(&self, operation: &'static str, transition: Transition) -> Result<Habit> {
        let Transition {
            mut habit,
            effects,
        } = transition;
        let mut fresh_job = None;
        let mut cancelled = false;

        for effect in effects {
            match effect {
                Effect::Schedule {
                    first_run_at,
                    interval,
                } => {
                    let job_id = self
                        .core
                        .scheduler
                        .schedule(habit.id, first_run_at, interval, self.driver())
                        .await?;
                    habit.scheduled_job_id = Some(job_id);
                    fresh_job = Some(job_id);
                }
                Effect::Reschedule {
                    job_id,
                    first_run_at,
                    interval,
                } => {
                    if let Some(adopted) = self
                        .reschedule_or_adopt(&mut habit, job_id, first_run_at, interval)
                        .await?
                    {
                        fresh_job = Some(adopted);
                    }
                }
                Effect::Cancel { job_id } => {
                    let removed = match job_id {
                        Some(job_id) => self.core.scheduler.cancel(job_id).await,
                        None => false,
                    };
                    if !removed {
                        self.core.scheduler.cancel_habit(habit.id).await;
                    }
                    cancelled = true;
                }
                Effect::Persist => {
                    if let Err(e) = self.core.store.save(&habit).await {
                        if let Some(job_id) = fresh_job {
                            self.core.scheduler.cancel(job_id).await;
                        }
                        return Err(e);
                    }
                }
                Effect::Remove => {
                    if let Err(e) = self.core.store.delete(habit.id).await {
                        if cancelled && !matches!(e, Error::NotFound(_)) {
                            self.restore_job(&habit).await;
                        }
                        return Err(e);
                    }
                }
                Effect::Audit(record) => self.audit(record).await?,
            }
        }

        metrics::habit_transitions().add(1, &[KeyValue::new("transition", operation)]);
        Ok(habit)
    }

    /// Put back the job of a habit whose removal failed, so its cycles keep
    /// rolling over without waiting for the next reconcile.
    async fn restore_job(&self, habit: &Habit) {
        let interval = habit.periodicity.interval();
        match self
            .core
            .scheduler
            .schedule(habit.id, habit.next_cycle_start, interval, self.driver())
            .await
        {
            Ok(job_id) => warn!(habit_id = %habit.id, %job_id, "removal failed, job restored"),
            Err(e) => error!(habit_id = %habit.id, "removal failed, job not restored: {e}"),
        }
    }

    /// Move the habit's job. A handle this scheduler does not know (stored by
    /// an earlier process) is replaced by the habit's live local job, or a
    /// new one. Returns the id of a newly created job, if any.
    async fn reschedule_or_adopt(
        &self,
        habit: &mut Habit,
        job_id: Option<JobId>,
        first_run_at: DateTime<Utc>,
        interval: TimeDelta,
    ) -> Result<Option<JobId>> {
        let scheduler = &self.core.scheduler;

        if let Some(job_id) = job_id {
            match scheduler.reschedule(job_id, interval, first_run_at).await {
                Ok(()) => return Ok(None),
                Err(Error::JobNotFound(_)) => {
                    warn!(habit_id = %habit.id, %job_id, "stale job handle, adopting habit");
                }
                Err(e) => return Err(e),
            }
        }

        if let Some(live) = scheduler.job_for(habit.id).await {
            scheduler
                .reschedule(live.job_id, interval, first_run_at)
                .await?;
            habit.scheduled_job_id = Some(live.job_id);
            return Ok(None);
        }

        let job_id = scheduler
            .schedule(habit.id, first_run_at, interval, self.driver())
            .await?;
        habit.scheduled_job_id = Some(job_id);
        Ok(Some(job_id))
    }
}

fn observe(operation: &'static str, started: Instant) {
    metrics::operation_duration_ms().record(
        started.elapsed().as_secs_f64() * 1000.0,
        &[KeyValue::new("operation", operation)],
    );
}
