//! Progress store for chunkd uploads.
//!
//! An upload's durable state is a single small record — the [`UploadStatus`]
//! tuple — keyed by the logical file name the client resumes with. This
//! crate defines the record schema, the [`ProgressStore`] trait the upload
//! engine consumes, and two implementations:
//!
//! - [`JsonFileStore`]: one JSON document per record under a state
//!   directory. Survives process restarts, which is what makes resuming a
//!   long-abandoned upload possible.
//! - [`MemoryStore`]: a `HashMap` behind an `RwLock`. Used by tests and
//!   suitable for deployments that do not need resume-across-restart.
//!
//! The store is deliberately dumb: no transactions span it and the chunk
//! files on disk. The upload engine orders its writes so that the record
//! never claims a chunk that was not durably written first.

mod json;
mod memory;
mod status;

pub use json::JsonFileStore;
pub use memory::MemoryStore;
pub use status::UploadStatus;

use uuid::Uuid;

/// Errors that can occur during progress-record operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record for this file name already exists
    #[error("upload record already exists for {0}")]
    Duplicate(String),

    /// No record exists for this file name
    #[error("no upload record for {0}")]
    Missing(String),

    /// I/O error reading or writing a record
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized
    #[error("failed to serialize upload record: {0}")]
    Serialization(serde_json::Error),

    /// Record could not be deserialized
    #[error("failed to deserialize upload record: {0}")]
    Deserialization(serde_json::Error),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Durable CRUD over [`UploadStatus`] records, keyed by logical file name.
///
/// Implementations must provide read-your-writes consistency for a single
/// key; the upload engine serialises all operations for one file name behind
/// a per-name lock, so concurrent calls only ever target distinct keys.
pub trait ProgressStore: Send + Sync {
    /// Creates a new record. Fails with [`StoreError::Duplicate`] if a
    /// record for the same file name already exists.
    fn create(&self, record: &UploadStatus) -> StoreResult<()>;

    /// Loads the record for `file_name`, if any.
    fn load(&self, file_name: &str) -> StoreResult<Option<UploadStatus>>;

    /// Overwrites an existing record. Fails with [`StoreError::Missing`] if
    /// no record for the file name exists.
    fn update(&self, record: &UploadStatus) -> StoreResult<()>;

    /// Deletes the record for `file_name`. Returns whether a record existed;
    /// deleting an absent record is not an error.
    fn delete(&self, file_name: &str) -> StoreResult<bool>;

    /// Deletes the record with the given id, wherever it is keyed. Returns
    /// whether a record existed.
    fn delete_by_id(&self, id: Uuid) -> StoreResult<bool>;

    /// Lists all in-flight records, for operator cleanup.
    fn list(&self) -> StoreResult<Vec<UploadStatus>>;
}
