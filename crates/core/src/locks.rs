//! Per-file-name mutual exclusion.
//!
//! Two chunks for the same logical file uploaded concurrently could
//! interleave tracker updates or race the merge trigger, so the whole
//! receive-and-maybe-merge sequence for one name must be serialised.
//! Unrelated uploads must not contend, so a single global lock is out.
//!
//! [`FileLockMap`] keeps one mutex per file name, created on demand and
//! removed again once no upload for that name is in flight.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Map from file name to an on-demand mutex.
#[derive(Debug, Default)]
pub struct FileLockMap {
    entries: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FileLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock cell for `name`, creating it if absent.
    ///
    /// Callers lock the returned mutex for the duration of the critical
    /// section and then call [`release`](Self::release) after dropping both
    /// the guard and the `Arc`.
    pub fn acquire(&self, name: &str) -> Arc<Mutex<()>> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.entry(name.to_owned()).or_default().clone()
    }

    /// Drops the cell for `name` if no other holder remains.
    ///
    /// Both creation and this check happen under the map lock, so a cell can
    /// never be removed while another thread still holds or is cloning it.
    pub fn release(&self, name: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cell) = entries.get(name) {
            if Arc::strong_count(cell) == 1 {
                entries.remove(name);
            }
        }
    }

    /// Runs `f` while holding the lock for `name`.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let cell = self.acquire(name);
        let result = {
            let _guard = cell.lock().unwrap_or_else(|e| e.into_inner());
            f()
        };
        drop(cell);
        self.release(name);
        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
