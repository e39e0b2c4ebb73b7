//! The persistent upload progress record.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Progress record for one in-flight upload.
///
/// `chunk` is a high-water mark: the highest chunk index successfully
/// received *and* persisted. A value of `chunks` means every chunk is on
/// disk and the upload is ready to merge; after a successful merge the
/// record is deleted, so a present record always denotes an in-flight
/// upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct UploadStatus {
    /// Opaque identifier, generated at creation, stable for the upload's
    /// life. Internal attribute only; clients key on `file_name`.
    pub id: Uuid,

    /// Logical target file name, the natural key clients resume with.
    pub file_name: String,

    /// Highest chunk index (1-based) successfully received and persisted.
    pub chunk: u32,

    /// Total number of chunks the client declared. Immutable once the first
    /// chunk establishes the record.
    pub chunks: u32,

    /// When the record was created. Operator visibility for stale uploads;
    /// never consulted by protocol logic.
    pub created_at: DateTime<Utc>,
}

impl UploadStatus {
    /// Creates a fresh record with a generated id.
    pub fn new(file_name: impl Into<String>, chunk: u32, chunks: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file_name.into(),
            chunk,
            chunks,
            created_at: Utc::now(),
        }
    }

    /// Whether every declared chunk has been received.
    pub fn is_ready_to_merge(&self) -> bool {
        self.chunk == self.chunks
    }
}
