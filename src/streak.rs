//! Streak engine: pure transitions over a habit's completion flag and
//! streak counters.
//!
//! Two events move a streak: a completion inside the current cycle, and the
//! rollover that closes the cycle. A streak grows by at most one per cycle
//! (on completion) and is either kept or reset on rollover. `longest` never
//! decreases.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The streak-relevant slice of a habit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub is_completed: bool,
    pub current: u32,
    pub longest: u32,
}

/// How a completion attempt was credited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credit {
    /// Completed before the cycle boundary.
    OnTime,
    /// Completed after the boundary passed but before rollover ran. Still
    /// credited to the open cycle; only the scheduler closes cycles.
    Late,
    /// The cycle was already satisfied. Nothing changed.
    AlreadyCompleted,
}

impl Credit {
    pub fn changed_state(self) -> bool {
        !matches!(self, Credit::AlreadyCompleted)
    }
}

/// Apply a completion at `now` against a cycle ending at `next_cycle_start`.
pub fn on_complete(
    state: Streak,
    now: DateTime<Utc>,
    next_cycle_start: DateTime<Utc>,
) -> (Streak, Credit) {
    if state.is_completed {
        return (state, Credit::AlreadyCompleted);
    }

    let current = state.current.saturating_add(1);
    let next = Streak {
        is_completed: true,
        current,
        longest: state.longest.max(current),
    };
    let credit = if now < next_cycle_start {
        Credit::OnTime
    } else {
        Credit::Late
    };
    (next, credit)
}

/// Close the current cycle. A satisfied cycle keeps the streak; a missed one
/// resets it. Either way the next cycle starts unsatisfied.
pub fn on_rollover(state: Streak) -> Streak {
    let current = if state.is_completed { state.current } else { 0 };
    Streak {
        is_completed: false,
        current,
        longest: state.longest.max(current),
    }
}
