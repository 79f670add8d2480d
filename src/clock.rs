//! Time source for the engine and scheduler.
//!
//! Everything that needs "now" or needs to wait for an instant goes through
//! [`Clock`], so tests can swap the wall clock for a [`ManualClock`] and move
//! time forward explicitly.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;

/// Longest single nap taken by [`SystemClock::sleep_until`]. Wall-clock jumps
/// (suspend, NTP corrections) are noticed within this window.
const MAX_NAP: std::time::Duration = std::time::Duration::from_secs(60);

#[async_trait::async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Resolve at or after `deadline`. May also resolve early; callers
    /// re-check `now()` before acting.
    async fn sleep_until(&self, deadline: DateTime<Utc>);
}

/// Wall clock backed by `Utc::now()` and tokio timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let remaining = (deadline - Utc::now()).to_std().unwrap_or_default();
        tokio::time::sleep(remaining.min(MAX_NAP)).await;
    }
}

/// Clock that only moves when told to. Sleepers wake as soon as the clock is
/// set at or past their deadline.
#[derive(Debug)]
pub struct ManualClock {
    now: watch::Sender<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        let (now, _) = watch::channel(start);
        Self { now }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        self.now.send_replace(to);
    }

    pub fn advance(&self, by: TimeDelta) {
        self.now.send_modify(|now| *now += by);
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.borrow()
    }

    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        let mut rx = self.now.subscribe();
        // Sender lives as long as self, so this only errors during teardown.
        let _ = rx.wait_for(|now| *now >= deadline).await;
    }
}
