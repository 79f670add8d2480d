//! Per-habit exclusive locks.
//!
//! Every read-modify-write on a habit (user operation or scheduler rollover)
//! holds that habit's lock for its whole duration. Different habits never
//! contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::habit::HabitId;

#[derive(Default)]
pub(crate) struct HabitLocks {
    locks: Mutex<HashMap<HabitId, Arc<Mutex<()>>>>,
}

impl HabitLocks {
    pub(crate) async fn acquire(&self, id: HabitId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a removed habit. Anyone still queued on the old
    /// lock proceeds and finds the habit gone.
    pub(crate) async fn forget(&self, id: HabitId) {
        self.locks.lock().await.remove(&id);
    }
}
