//! Per-(owner, period) write locks
//!
//! A record mutation and the summary recalculation that follows it are two
//! separate store interactions. Holding the period lock across both keeps
//! concurrent writers in the same month from interleaving their recomputes.
//!
//! Writers of an existing record lock the period they last saw it in, then
//! re-read it under the lock and retry if it moved.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::Owner;
use crate::period::Period;

type LockKey = (String, String);

/// Lock table shared by every clone of a `Database`
#[derive(Clone, Default)]
pub struct PeriodLocks {
    table: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl PeriodLocks {
    fn handle(&self, key: LockKey) -> Arc<Mutex<()>> {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.entry(key).or_default().clone()
    }

    /// Run `f` while holding the lock of every listed period for `owner`
    ///
    /// Locks are taken in sorted order and duplicates are skipped, so two
    /// callers moving records in opposite directions cannot deadlock.
    pub fn with_periods<T>(&self, owner: &Owner, periods: &[&Period], f: impl FnOnce() -> T) -> T {
        let mut keys: Vec<LockKey> = periods
            .iter()
            .map(|p| (owner.as_str().to_string(), p.as_str().to_string()))
            .collect();
        keys.sort();
        keys.dedup();

        let handles: Vec<Arc<Mutex<()>>> = keys.iter().map(|k| self.handle(k.clone())).collect();
        let result = {
            let _guards: Vec<_> = handles
                .iter()
                .map(|m| m.lock().unwrap_or_else(|e| e.into_inner()))
                .collect();
            f()
        };

        drop(handles);
        self.release(&keys);
        result
    }

    /// Drop table entries nobody else holds
    fn release(&self, keys: &[LockKey]) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        for key in keys {
            if table.get(key).is_some_and(|m| Arc::strong_count(m) == 1) {
                table.remove(key);
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
