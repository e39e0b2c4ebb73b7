//! In-memory progress store.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

use crate::{ProgressStore, StoreError, StoreResult, UploadStatus};

/// A `HashMap`-backed [`ProgressStore`].
///
/// Progress does not survive a process restart; intended for tests and for
/// deployments that accept losing resume state on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, UploadStatus>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, UploadStatus>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, UploadStatus>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl ProgressStore for MemoryStore {
    fn create(&self, record: &UploadStatus) -> StoreResult<()> {
        let mut records = self.write();
        if records.contains_key(&record.file_name) {
            return Err(StoreError::Duplicate(record.file_name.clone()));
        }
        records.insert(record.file_name.clone(), record.clone());
        Ok(())
    }

    fn load(&self, file_name: &str) -> StoreResult<Option<UploadStatus>> {
        Ok(self.read().get(file_name).cloned())
    }

    fn update(&self, record: &UploadStatus) -> StoreResult<()> {
        let mut records = self.write();
        match records.get_mut(&record.file_name) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(record.file_name.clone())),
        }
    }

    fn delete(&self, file_name: &str) -> StoreResult<bool> {
        Ok(self.write().remove(file_name).is_some())
    }

    fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        let mut records = self.write();
        let key = records
            .values()
            .find(|r| r.id == id)
            .map(|r| r.file_name.clone());
        match key {
            Some(key) => {
                records.remove(&key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn list(&self) -> StoreResult<Vec<UploadStatus>> {
        Ok(self.read().values().cloned().collect())
    }
}
