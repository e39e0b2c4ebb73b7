//! Upload progress tracking.

use std::sync::Arc;

use chunkd_store::{ProgressStore, StoreError, UploadStatus};
use chunkd_types::FileName;
use uuid::Uuid;

use crate::{UploadError, UploadResult};

/// Owns all progress-store interactions for in-flight uploads.
///
/// The tracker stores a *high-water mark* chunk index per file name, not a
/// bitmap of received chunks. It therefore relies on the assembler enforcing
/// strictly sequential delivery; it cannot detect gaps by itself.
#[derive(Clone)]
pub struct UploadTracker {
    store: Arc<dyn ProgressStore>,
}

impl UploadTracker {
    pub fn new(store: Arc<dyn ProgressStore>) -> Self {
        Self { store }
    }

    /// Creates a new progress record and returns its id.
    ///
    /// # Errors
    ///
    /// [`UploadError::Conflict`] if an active record for `file_name` already
    /// exists; callers that intend a restart use [`advance`](Self::advance)
    /// instead.
    pub fn begin(&self, file_name: &FileName, chunk: u32, chunks: u32) -> UploadResult<Uuid> {
        let record = UploadStatus::new(file_name.as_str(), chunk, chunks);
        let id = record.id;
        match self.store.create(&record) {
            Ok(()) => {
                tracing::debug!(file_name = %file_name, %id, chunks, "upload started");
                Ok(id)
            }
            Err(StoreError::Duplicate(name)) => Err(UploadError::Conflict(format!(
                "an upload for {name} is already in progress"
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Exact lookup by logical name.
    pub fn find(&self, file_name: &FileName) -> UploadResult<Option<UploadStatus>> {
        Ok(self.store.load(file_name.as_str())?)
    }

    /// Sets the high-water mark for `file_name` to `chunk`.
    ///
    /// # Errors
    ///
    /// [`UploadError::NotFound`] if no record exists; callers must
    /// [`begin`](Self::begin) first.
    pub fn advance(&self, file_name: &FileName, chunk: u32) -> UploadResult<()> {
        let mut record = self
            .find(file_name)?
            .ok_or_else(|| UploadError::NotFound(file_name.to_string()))?;
        record.chunk = chunk;
        match self.store.update(&record) {
            Ok(()) => {
                tracing::debug!(file_name = %file_name, chunk, total = record.chunks, "progress advanced");
                Ok(())
            }
            Err(StoreError::Missing(name)) => Err(UploadError::NotFound(name)),
            Err(e) => Err(e.into()),
        }
    }

    /// Convenience read: the current high-water mark, 0 if no record.
    pub fn current_chunk(&self, file_name: &FileName) -> UploadResult<u32> {
        Ok(self.find(file_name)?.map(|r| r.chunk).unwrap_or(0))
    }

    /// Deletes the record for `file_name`. Idempotent; removing a
    /// non-existent record is not an error.
    pub fn remove(&self, file_name: &FileName) -> UploadResult<()> {
        self.store.delete(file_name.as_str())?;
        Ok(())
    }

    /// Deletes the record with the given id. Idempotent.
    pub fn remove_by_id(&self, id: Uuid) -> UploadResult<()> {
        self.store.delete_by_id(id)?;
        Ok(())
    }
}
