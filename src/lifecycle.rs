//! Habit state machine.
//!
//! Transitions are pure: each takes the current habit (and the time it
//! happens at) and returns the next habit plus the side effects the engine
//! must carry out, in order. Nothing here touches storage, the scheduler, or
//! the audit trail directly.
//!
//! ```text
//! Pending   --complete--> Completed   streak+1
//! Completed --complete--> Completed   no-op (still audited)
//! Pending   --rollover--> Pending     streak reset
//! Completed --rollover--> Pending     streak kept
//! any       --delete----> (removed)   job cancelled first
//! ```

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::Result;
use crate::model::activity::{ActivityRecord, Category};
use crate::model::habit::{Habit, HabitEdit, HabitId, NewHabit, Periodicity};
use crate::scheduler::{Fire, JobId};
use crate::streak::{self, Credit, Streak};

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Register the habit's recurring job; the engine stores the new handle
    /// on the habit.
    Schedule {
        first_run_at: DateTime<Utc>,
        interval: TimeDelta,
    },
    /// Move the habit's job to a new boundary and interval.
    Reschedule {
        job_id: Option<JobId>,
        first_run_at: DateTime<Utc>,
        interval: TimeDelta,
    },
    /// Stop the habit's job.
    Cancel { job_id: Option<JobId> },
    /// Save the habit as it stands after the transition.
    Persist,
    /// Delete the habit from storage.
    Remove,
    /// Append to the audit trail. Always after the state change it describes.
    Audit(ActivityRecord),
}

/// Result of a transition: the next state and what to do about it.
#[derive(Debug, Clone)]
pub struct Transition {
    pub habit: Habit,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditField {
    Name,
    Description,
    Periodicity,
}

impl std::fmt::Display for EditField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EditField::Name => "name",
            EditField::Description => "description",
            EditField::Periodicity => "periodicity",
        };
        write!(f, "{s}")
    }
}

/// A field an edit asked for but did not get.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub field: EditField,
    pub reason: String,
}

/// Outcome of [`Habit::edit`]. Fields are applied independently, so an edit
/// can change some fields and reject others.
#[derive(Debug, Clone)]
pub struct Edited {
    pub transition: Transition,
    pub changed: Vec<EditField>,
    pub rejected: Vec<Rejection>,
}

impl Habit {
    /// Build a new habit created at `now`. Fails only on an unknown
    /// periodicity.
    pub fn create(new: &NewHabit, now: DateTime<Utc>) -> Result<Transition> {
        let periodicity: Periodicity = new.periodicity.parse()?;
        let id = HabitId::new();
        let next_cycle_start = periodicity.boundary_after(now);

        let habit = Habit {
            id,
            user_id: new.user_id,
            name: new.name.clone(),
            description: new.description.clone().unwrap_or_default(),
            periodicity,
            created_at: now,
            is_completed: false,
            last_completion_time: None,
            next_cycle_start,
            current_streak: 0,
            longest_streak: 0,
            scheduled_job_id: None,
        };

        let effects = vec![
            Effect::Schedule {
                first_run_at: next_cycle_start,
                interval: periodicity.interval(),
            },
            Effect::Persist,
            Effect::Audit(ActivityRecord::habit(
                Category::CreatedHabit,
                habit.user_id,
                id,
                now,
            )),
        ];

        Ok(Transition { habit, effects })
    }

    /// Mark the current cycle done as of `at`. The audit record is written
    /// even when the cycle was already done.
    pub fn complete(mut self, at: DateTime<Utc>) -> (Transition, Credit) {
        let (next, credit) = streak::on_complete(self.streak(), at, self.next_cycle_start);

        let mut effects = Vec::with_capacity(2);
        if credit.changed_state() {
            self.set_streak(next);
            self.last_completion_time = Some(at);
            effects.push(Effect::Persist);
        }
        effects.push(Effect::Audit(ActivityRecord::habit(
            Category::CompletedHabit,
            self.user_id,
            self.id,
            at,
        )));

        (
            Transition {
                habit: self,
                effects,
            },
            credit,
        )
    }

    /// Apply the non-empty, actually-different fields of `edit`.
    ///
    /// A periodicity change recomputes the boundary from `now` under the new
    /// cycle length and reschedules the job. If `now` is already past the
    /// old boundary, that cycle is closed first, exactly as its rollover
    /// would have. An unknown periodicity is
    /// rejected without affecting the other fields.
    pub fn edit(mut self, edit: &HabitEdit, now: DateTime<Utc>) -> Edited {
        let mut changed = Vec::new();
        let mut rejected = Vec::new();
        let mut audits = Vec::new();
        let mut reschedule = None;

        if let Some(name) = non_empty(&edit.name).filter(|n| *n != self.name) {
            self.name = name.to_string();
            changed.push(EditField::Name);
            audits.push(Category::ChangedTheNameOfHabit);
        }

        if let Some(description) = non_empty(&edit.description).filter(|d| *d != self.description)
        {
            self.description = description.to_string();
            changed.push(EditField::Description);
            audits.push(Category::ChangedTheDescriptionOfHabit);
        }

        if let Some(raw) = non_empty(&edit.periodicity) {
            match raw.parse::<Periodicity>() {
                Ok(periodicity) if periodicity != self.periodicity => {
                    if now >= self.next_cycle_start {
                        // The old cycle ended but its rollover has not run.
                        // Close it under the old schedule before moving on.
                        self.set_streak(streak::on_rollover(self.streak()));
                    }
                    self.periodicity = periodicity;
                    self.next_cycle_start = periodicity.boundary_after(now);
                    reschedule = Some(Effect::Reschedule {
                        job_id: self.scheduled_job_id,
                        first_run_at: self.next_cycle_start,
                        interval: periodicity.interval(),
                    });
                    changed.push(EditField::Periodicity);
                    audits.push(Category::ChangedThePeriodicityOfHabit);
                }
                Ok(_) => {}
                Err(e) => rejected.push(Rejection {
                    field: EditField::Periodicity,
                    reason: e.to_string(),
                }),
            }
        }

        let mut effects = Vec::new();
        effects.extend(reschedule);
        if !changed.is_empty() {
            effects.push(Effect::Persist);
        }
        effects.extend(audits.into_iter().map(|category| {
            Effect::Audit(ActivityRecord::habit(category, self.user_id, self.id, now))
        }));

        Edited {
            transition: Transition {
                habit: self,
                effects,
            },
            changed,
            rejected,
        }
    }

    /// Close the cycle for a scheduler fire and aim the job at the next
    /// boundary, computed from the fire time so drift never accumulates.
    /// Rollovers are not audited; only explicit user actions are.
    pub fn rollover(mut self, fire: &Fire) -> (Transition, Streak) {
        let before = self.streak();
        self.set_streak(streak::on_rollover(before));
        self.next_cycle_start = self.periodicity.boundary_after(fire.fired_at);
        self.scheduled_job_id = Some(fire.job_id);

        let effects = vec![
            Effect::Reschedule {
                job_id: Some(fire.job_id),
                first_run_at: self.next_cycle_start,
                interval: self.periodicity.interval(),
            },
            Effect::Persist,
        ];

        (
            Transition {
                habit: self,
                effects,
            },
            before,
        )
    }

    /// Remove the habit. The job goes first so no rollover can fire against
    /// a habit that is being removed.
    pub fn delete(self, now: DateTime<Utc>) -> Transition {
        let effects = vec![
            Effect::Cancel {
                job_id: self.scheduled_job_id,
            },
            Effect::Remove,
            Effect::Audit(ActivityRecord::habit(
                Category::DeletedHabit,
                self.user_id,
                self.id,
                now,
            )),
        ];
        Transition {
            habit: self,
            effects,
        }
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}
