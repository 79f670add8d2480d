//! Engine behavior end to end: in-memory store, manual clock, real scheduler.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use habit_tracker::clock::{Clock, ManualClock};
use habit_tracker::engine::HabitEngine;
use habit_tracker::error::Error;
use habit_tracker::lifecycle::EditField;
use habit_tracker::model::*;
use habit_tracker::scheduler::{JobId, Scheduler};
use habit_tracker::store::{ActivitySink, HabitLease, HabitStore, MemoryStore};
use tokio::sync::Notify;

struct Harness {
    engine: HabitEngine,
    store: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
}

fn day(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap() + TimeDelta::days(n)
}

fn harness_at(start: DateTime<Utc>) -> Harness {
    let clock = Arc::new(ManualClock::new(start));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(MemoryStore::new());
    let engine = HabitEngine::new(
        store.clone(),
        store.clone(),
        Arc::clone(&dyn_clock),
        Scheduler::new(dyn_clock),
    );
    Harness {
        engine,
        store,
        clock,
    }
}

fn harness() -> Harness {
    harness_at(day(0))
}

async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let waited = tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "timed out waiting for {what}");
}

impl Harness {
    async fn create(&self, user: i64, name: &str, periodicity: &str) -> Habit {
        self.engine
            .create(NewHabit::new(UserId(user), name, periodicity))
            .await
            .unwrap()
    }

    /// Move the clock to `to` and wait for the habit's cycle to end there.
    async fn roll_to(&self, id: HabitId, to: DateTime<Utc>, periodicity: Periodicity) {
        self.clock.set(to);
        let expected = periodicity.boundary_after(to);
        let store = Arc::clone(&self.store);
        eventually("rollover", move || {
            let store = Arc::clone(&store);
            async move { store.load(id).await.unwrap().next_cycle_start == expected }
        })
        .await;
    }

    async fn categories(&self) -> Vec<Category> {
        self.store
            .records()
            .await
            .into_iter()
            .map(|r| r.category)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Create / complete / rollover
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_persists_schedules_and_audits() {
    let h = harness_at(day(0) + TimeDelta::hours(15));
    let habit = h.create(1, "run", "daily").await;

    let stored = h.store.load(habit.id).await.unwrap();
    assert_eq!(stored, habit);
    assert_eq!(habit.next_cycle_start, day(1));

    let job = h.engine.scheduler().job_for(habit.id).await.unwrap();
    assert_eq!(habit.scheduled_job_id, Some(job.job_id));
    assert_eq!(job.next_fire, day(1));
    assert_eq!(job.interval, TimeDelta::days(1));

    assert_eq!(h.categories().await, vec![Category::CreatedHabit]);
}

#[tokio::test]
async fn create_with_bad_periodicity_leaves_no_trace() {
    let h = harness();
    let result = h
        .engine
        .create(NewHabit::new(UserId(1), "run", "hourly"))
        .await;

    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(h.store.list(None, None).await.unwrap().is_empty());
    assert!(h.engine.scheduler().jobs().await.is_empty());
    assert!(h.store.records().await.is_empty());
}

#[tokio::test]
async fn daily_streak_grows_and_resets_on_miss() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    h.clock.set(day(0) + TimeDelta::seconds(5));
    h.engine.complete(id, None).await.unwrap();
    h.roll_to(id, day(1), Periodicity::Daily).await;

    let habit = h.engine.get(id).await.unwrap();
    assert_eq!(habit.phase(), Phase::Pending);
    assert_eq!((habit.current_streak, habit.longest_streak), (1, 1));

    h.clock.set(day(1) + TimeDelta::hours(1));
    h.engine.complete(id, None).await.unwrap();
    h.roll_to(id, day(2), Periodicity::Daily).await;

    let habit = h.engine.get(id).await.unwrap();
    assert_eq!((habit.current_streak, habit.longest_streak), (2, 2));

    // Day 2 skipped.
    h.roll_to(id, day(3), Periodicity::Daily).await;
    let habit = h.engine.get(id).await.unwrap();
    assert_eq!((habit.current_streak, habit.longest_streak), (0, 2));
    assert_eq!(habit.last_completion_time, Some(day(1) + TimeDelta::hours(1)));
}

#[tokio::test]
async fn completing_twice_in_a_cycle_counts_once() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    let first = h.engine.complete(id, None).await.unwrap();
    h.clock.advance(TimeDelta::hours(2));
    let second = h.engine.complete(id, None).await.unwrap();

    assert_eq!(first.current_streak, 1);
    assert_eq!(second, first);
    assert_eq!(
        h.categories().await,
        vec![
            Category::CreatedHabit,
            Category::CompletedHabit,
            Category::CompletedHabit
        ]
    );
}

#[tokio::test]
async fn late_completion_before_rollover_keeps_streak() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    // Completion stamped after the boundary, before the clock (and so the
    // rollover) reaches it.
    let late = day(1) + TimeDelta::seconds(30);
    let habit = h.engine.complete(id, Some(late)).await.unwrap();
    assert_eq!(habit.current_streak, 1);
    assert_eq!(habit.last_completion_time, Some(late));

    h.roll_to(id, day(1) + TimeDelta::minutes(1), Periodicity::Daily)
        .await;
    let habit = h.engine.get(id).await.unwrap();
    assert_eq!(habit.current_streak, 1);
    assert!(!habit.is_completed);
}

#[tokio::test]
async fn long_outage_rolls_over_once() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;
    h.engine.complete(id, None).await.unwrap();

    let back = day(4) + TimeDelta::hours(6);
    h.roll_to(id, back, Periodicity::Daily).await;

    let habit = h.engine.get(id).await.unwrap();
    // One fire: the completed cycle is kept, the missed ones are not counted.
    assert_eq!((habit.current_streak, habit.longest_streak), (1, 1));
    assert_eq!(habit.next_cycle_start, day(5));
    assert_eq!(
        h.engine.scheduler().job_for(id).await.unwrap().next_fire,
        day(5)
    );
}

#[tokio::test]
async fn rollover_is_not_audited() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;
    h.roll_to(id, day(1), Periodicity::Daily).await;

    assert_eq!(h.categories().await, vec![Category::CreatedHabit]);
}

#[tokio::test]
async fn streak_invariant_holds_over_many_cycles() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    for n in 0..6 {
        if n % 3 != 2 {
            h.clock.set(day(n) + TimeDelta::hours(8));
            h.engine.complete(id, None).await.unwrap();
        }
        h.roll_to(id, day(n + 1), Periodicity::Daily).await;
        let habit = h.engine.get(id).await.unwrap();
        assert!(habit.current_streak <= habit.longest_streak);
    }

    let habit = h.engine.get(id).await.unwrap();
    assert_eq!((habit.current_streak, habit.longest_streak), (0, 2));
}

// ---------------------------------------------------------------------------
// Edit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn edit_periodicity_moves_the_cycle() {
    let h = harness_at(day(0) + TimeDelta::hours(15));
    let id = h.create(1, "run", "daily").await.id;

    let outcome = h
        .engine
        .edit(id, HabitEdit::new().periodicity("weekly"))
        .await
        .unwrap();
    assert_eq!(outcome.changed, vec![EditField::Periodicity]);
    assert_eq!(outcome.habit.next_cycle_start, day(7));

    let job = h.engine.scheduler().job_for(id).await.unwrap();
    assert_eq!(job.next_fire, day(7));
    assert_eq!(job.interval, TimeDelta::days(7));

    // The old daily boundary passes without a rollover.
    h.clock.set(day(1));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.get(id).await.unwrap().next_cycle_start, day(7));

    h.roll_to(id, day(7), Periodicity::Weekly).await;
    assert_eq!(h.engine.get(id).await.unwrap().next_cycle_start, day(14));
}

#[tokio::test]
async fn edit_applies_name_despite_bad_periodicity() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    let outcome = h
        .engine
        .edit(id, HabitEdit::new().name("jog").periodicity("yearly"))
        .await
        .unwrap();

    assert_eq!(outcome.changed, vec![EditField::Name]);
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].field, EditField::Periodicity);

    let stored = h.engine.get(id).await.unwrap();
    assert_eq!(stored.name, "jog");
    assert_eq!(stored.periodicity, Periodicity::Daily);
    assert_eq!(
        h.categories().await,
        vec![Category::CreatedHabit, Category::ChangedTheNameOfHabit]
    );
}

#[tokio::test]
async fn edit_adopts_habit_with_stale_job_handle() {
    let h = harness();
    // A habit written by another process: its job handle means nothing here.
    let mut habit = Habit::create(&NewHabit::new(UserId(1), "run", "daily"), day(0))
        .unwrap()
        .habit;
    habit.scheduled_job_id = Some(JobId::new());
    h.store.save(&habit).await.unwrap();

    let outcome = h
        .engine
        .edit(habit.id, HabitEdit::new().periodicity("weekly"))
        .await
        .unwrap();

    let job = h.engine.scheduler().job_for(habit.id).await.unwrap();
    assert_eq!(outcome.habit.scheduled_job_id, Some(job.job_id));
    assert_eq!(job.next_fire, day(7));
    assert_eq!(
        h.store.load(habit.id).await.unwrap().scheduled_job_id,
        Some(job.job_id)
    );
}

#[tokio::test]
async fn operations_on_missing_habit_are_not_found() {
    let h = harness();
    let id = HabitId::new();

    assert!(matches!(h.engine.complete(id, None).await, Err(Error::NotFound(_))));
    assert!(matches!(
        h.engine.edit(id, HabitEdit::new().name("x")).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(h.engine.delete(id).await, Err(Error::NotFound(_))));
    assert!(h.store.records().await.is_empty());
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_habit_and_job() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    h.engine.delete(id).await.unwrap();

    assert!(matches!(h.store.load(id).await, Err(Error::NotFound(_))));
    assert!(h.engine.scheduler().job_for(id).await.is_none());
    assert_eq!(
        h.categories().await,
        vec![Category::CreatedHabit, Category::DeletedHabit]
    );
}

#[tokio::test]
async fn delete_during_pending_rollover_leaves_nothing_behind() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    // The boundary passes and the delete races the rollover it triggers.
    h.clock.set(day(1));
    h.engine.delete(id).await.unwrap();

    let engine = h.engine.clone();
    eventually("job removal", move || {
        let engine = engine.clone();
        async move { engine.scheduler().jobs().await.is_empty() }
    })
    .await;
    h.clock.set(day(3));
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert!(matches!(h.store.load(id).await, Err(Error::NotFound(_))));
    assert!(h.store.list(None, None).await.unwrap().is_empty());
    assert!(h.engine.scheduler().jobs().await.is_empty());
}

// ---------------------------------------------------------------------------
// Reconcile and shutdown
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconcile_catches_up_overdue_habit_once() {
    let h = harness_at(day(3) + TimeDelta::hours(2));
    // Written by an earlier process that stopped before day 1.
    let mut habit = Habit::create(&NewHabit::new(UserId(1), "run", "daily"), day(0))
        .unwrap()
        .habit;
    habit.scheduled_job_id = Some(JobId::new());
    h.store.save(&habit).await.unwrap();

    let report = h.engine.reconcile().await.unwrap();
    assert_eq!(report.scheduled, 1);

    let store = Arc::clone(&h.store);
    let id = habit.id;
    eventually("catch-up rollover", move || {
        let store = Arc::clone(&store);
        async move { store.load(id).await.unwrap().next_cycle_start == day(4) }
    })
    .await;

    let job = h.engine.scheduler().job_for(habit.id).await.unwrap();
    assert_eq!(job.next_fire, day(4));
    assert_eq!(
        h.store.load(habit.id).await.unwrap().scheduled_job_id,
        Some(job.job_id)
    );

    let again = h.engine.reconcile().await.unwrap();
    assert_eq!((again.scheduled, again.rescheduled, again.cancelled), (0, 0, 0));
}

#[tokio::test]
async fn reconcile_cancels_jobs_of_removed_habits() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    // Removed behind the engine's back, e.g. by another process.
    h.store.delete(id).await.unwrap();

    let report = h.engine.reconcile().await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert!(h.engine.scheduler().jobs().await.is_empty());
}

#[tokio::test]
async fn reconcile_realigns_drifted_job() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    // Another process switched the habit to weekly.
    let mut habit = h.store.load(id).await.unwrap();
    habit.periodicity = Periodicity::Weekly;
    habit.next_cycle_start = day(7);
    h.store.save(&habit).await.unwrap();

    let report = h.engine.reconcile().await.unwrap();
    assert_eq!(report.rescheduled, 1);

    let job = h.engine.scheduler().job_for(id).await.unwrap();
    assert_eq!(job.next_fire, day(7));
    assert_eq!(job.interval, TimeDelta::days(7));
}

#[tokio::test]
async fn shutdown_stops_timers_and_new_habits() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;

    h.engine.shutdown().await;
    assert!(h.engine.scheduler().jobs().await.is_empty());

    let result = h
        .engine
        .create(NewHabit::new(UserId(1), "swim", "weekly"))
        .await;
    assert!(matches!(result, Err(Error::SchedulerStopped)));

    h.clock.set(day(2));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(h.engine.get(id).await.unwrap().next_cycle_start, day(1));
    assert_eq!(h.store.list(None, None).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Analysis
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_habits_filters_by_owner_and_periodicity() {
    let h = harness();
    let run = h.create(1, "run", "daily").await;
    let swim = h.create(1, "swim", "weekly").await;
    h.create(2, "read", "daily").await;

    let all = h.engine.list_habits(UserId(1), None).await.unwrap();
    let ids: Vec<HabitId> = all.iter().map(|h| h.id).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&run.id) && ids.contains(&swim.id));

    let weekly = h.engine.list_habits(UserId(1), Some("weekly")).await.unwrap();
    assert_eq!(weekly.len(), 1);
    assert_eq!(weekly[0].id, swim.id);

    let bad = h.engine.list_habits(UserId(1), Some("hourly")).await;
    assert!(matches!(bad, Err(Error::Validation { .. })));

    let records = h.store.records().await;
    let tail: Vec<&ActivityRecord> = records.iter().rev().take(2).collect();
    assert_eq!(tail[0].category, Category::DisplayedHabitsWithPeriodicity);
    assert_eq!(tail[1].category, Category::DisplayedHabits);
}

#[tokio::test]
async fn longest_streak_queries() {
    let h = harness();
    let run = h.create(1, "run", "daily").await.id;
    let read = h.create(1, "read", "daily").await.id;
    let nap = h.create(1, "nap", "daily").await.id;
    let other = h.create(2, "walk", "daily").await.id;

    for id in [run, read, other] {
        h.engine.complete(id, None).await.unwrap();
    }
    // run and read tie at 1; nap never completed.
    let leaders = h.engine.habits_with_longest_streak(UserId(1)).await.unwrap();
    let mut leader_ids: Vec<HabitId> = leaders.iter().map(|h| h.id).collect();
    leader_ids.sort();
    let mut expected = vec![run, read];
    expected.sort();
    assert_eq!(leader_ids, expected);
    assert!(!leader_ids.contains(&nap));

    assert_eq!(h.engine.longest_streak_of(UserId(1), run).await.unwrap(), 1);
    assert!(matches!(
        h.engine.longest_streak_of(UserId(1), other).await,
        Err(Error::NotFound(_))
    ));

    let empty = h.engine.habits_with_longest_streak(UserId(99)).await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn activity_on_habit_is_ordered_and_scoped() {
    let h = harness();
    let id = h.create(1, "run", "daily").await.id;
    let other = h.create(1, "swim", "daily").await.id;

    h.clock.advance(TimeDelta::hours(1));
    h.engine.complete(id, None).await.unwrap();
    h.engine.complete(other, None).await.unwrap();
    h.clock.advance(TimeDelta::hours(1));
    h.engine
        .edit(id, HabitEdit::new().description("5k"))
        .await
        .unwrap();
    h.engine.show(id).await.unwrap();

    let history = h.engine.activity_on_habit(UserId(1), id).await.unwrap();
    let categories: Vec<Category> = history.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            Category::CreatedHabit,
            Category::CompletedHabit,
            Category::ChangedTheDescriptionOfHabit,
            Category::DisplayedHabit,
        ]
    );
    assert!(history.iter().all(|r| r.habit_id == Some(id)));
    assert!(history.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let last = h.store.records().await.pop().unwrap();
    assert_eq!(last.category, Category::DisplayedActivityOnHabit);
}

// ---------------------------------------------------------------------------
// Races and store failures
// ---------------------------------------------------------------------------

type Journal = Arc<Mutex<Vec<&'static str>>>;

/// Memory store that journals its calls and can hold a load or fail a delete
/// on request.
#[derive(Default)]
struct WatchedStore {
    inner: MemoryStore,
    journal: Journal,
    hold_load: AtomicBool,
    load_entered: Notify,
    load_release: Notify,
    fail_delete: AtomicBool,
}

impl WatchedStore {
    fn note(&self, call: &'static str) {
        self.journal.lock().unwrap().push(call);
    }

    fn take_journal(&self) -> Vec<&'static str> {
        std::mem::take(&mut *self.journal.lock().unwrap())
    }
}

struct JournalLease(Journal);

#[async_trait::async_trait]
impl HabitLease for JournalLease {
    async fn release(self: Box<Self>) -> habit_tracker::error::Result<()> {
        self.0.lock().unwrap().push("release");
        Ok(())
    }
}

#[async_trait::async_trait]
impl HabitStore for WatchedStore {
    async fn lease(&self, _id: HabitId) -> habit_tracker::error::Result<Box<dyn HabitLease>> {
        self.note("lease");
        Ok(Box::new(JournalLease(Arc::clone(&self.journal))))
    }

    async fn load(&self, id: HabitId) -> habit_tracker::error::Result<Habit> {
        self.note("load");
        if self.hold_load.swap(false, Ordering::SeqCst) {
            self.load_entered.notify_one();
            self.load_release.notified().await;
        }
        self.inner.load(id).await
    }

    async fn save(&self, habit: &Habit) -> habit_tracker::error::Result<()> {
        self.note("save");
        self.inner.save(habit).await
    }

    async fn delete(&self, id: HabitId) -> habit_tracker::error::Result<()> {
        self.note("delete");
        if self.fail_delete.swap(false, Ordering::SeqCst) {
            return Err(Error::Other("connection reset".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn list(
        &self,
        user_id: Option<UserId>,
        periodicity: Option<Periodicity>,
    ) -> habit_tracker::error::Result<Vec<Habit>> {
        self.inner.list(user_id, periodicity).await
    }
}

#[async_trait::async_trait]
impl ActivitySink for WatchedStore {
    async fn append(&self, record: ActivityRecord) -> habit_tracker::error::Result<()> {
        self.inner.append(record).await
    }

    async fn history(
        &self,
        user_id: UserId,
        habit_id: Option<HabitId>,
    ) -> habit_tracker::error::Result<Vec<ActivityRecord>> {
        self.inner.history(user_id, habit_id).await
    }
}

fn watched() -> (HabitEngine, Arc<WatchedStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(day(0)));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let store = Arc::new(WatchedStore::default());
    let engine = HabitEngine::new(
        store.clone(),
        store.clone(),
        Arc::clone(&dyn_clock),
        Scheduler::new(dyn_clock),
    );
    (engine, store, clock)
}

#[tokio::test]
async fn edit_racing_a_claimed_rollover_closes_the_ended_cycle() {
    let (engine, store, clock) = watched();
    let id = engine
        .create(NewHabit::new(UserId(1), "run", "daily"))
        .await
        .unwrap()
        .id;
    engine.complete(id, None).await.unwrap();

    // The edit takes the habit's lock and stalls in load.
    store.hold_load.store(true, Ordering::SeqCst);
    let editing = tokio::spawn({
        let engine = engine.clone();
        async move {
            engine
                .edit(id, HabitEdit::new().periodicity("weekly"))
                .await
        }
    });
    tokio::time::timeout(Duration::from_secs(2), store.load_entered.notified())
        .await
        .expect("edit never reached load");

    // Meanwhile the daily boundary passes and the job claims its fire.
    clock.set(day(1) + TimeDelta::seconds(1));
    let watching = engine.clone();
    eventually("fire claim", move || {
        let engine = watching.clone();
        async move {
            engine
                .scheduler()
                .job_for(id)
                .await
                .is_some_and(|job| job.next_fire > day(1))
        }
    })
    .await;

    store.load_release.notify_one();
    editing.await.unwrap().unwrap();
    // Let the queued rollover take the lock and finish.
    tokio::time::sleep(Duration::from_millis(30)).await;

    let habit = engine.get(id).await.unwrap();
    assert!(!habit.is_completed);
    assert_eq!((habit.current_streak, habit.longest_streak), (1, 1));
    assert_eq!(habit.next_cycle_start, day(8));

    let job = engine.scheduler().job_for(id).await.unwrap();
    assert_eq!(job.next_fire, day(8));
    assert_eq!(job.interval, TimeDelta::days(7));

    // The weekly cycle is open.
    let habit = engine.complete(id, None).await.unwrap();
    assert_eq!(habit.current_streak, 2);
}

#[tokio::test]
async fn changes_hold_the_store_lease_from_load_to_save() {
    let (engine, store, _clock) = watched();
    let id = engine
        .create(NewHabit::new(UserId(1), "run", "daily"))
        .await
        .unwrap()
        .id;
    store.take_journal();

    engine.complete(id, None).await.unwrap();
    assert_eq!(store.take_journal(), vec!["lease", "load", "save", "release"]);

    engine
        .edit(id, HabitEdit::new().name("jog"))
        .await
        .unwrap();
    assert_eq!(store.take_journal(), vec!["lease", "load", "save", "release"]);

    engine.delete(id).await.unwrap();
    assert_eq!(store.take_journal(), vec!["lease", "load", "delete", "release"]);
}

#[tokio::test]
async fn failed_removal_keeps_the_habit_scheduled() {
    let (engine, store, _clock) = watched();
    let id = engine
        .create(NewHabit::new(UserId(1), "run", "daily"))
        .await
        .unwrap()
        .id;

    store.fail_delete.store(true, Ordering::SeqCst);
    let result = engine.delete(id).await;
    assert!(matches!(result, Err(Error::Other(_))));

    assert!(store.inner.load(id).await.is_ok());
    let job = engine.scheduler().job_for(id).await.unwrap();
    assert_eq!(job.next_fire, day(1));
    assert_eq!(job.interval, TimeDelta::days(1));

    // A retry goes through.
    engine.delete(id).await.unwrap();
    assert!(engine.scheduler().job_for(id).await.is_none());
}
