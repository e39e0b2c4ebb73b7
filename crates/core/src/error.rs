use chunkd_store::StoreError;
use chunkd_types::FileNameError;

/// Errors surfaced by the upload engine.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// A required field was missing or structurally invalid
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No progress record exists for the file name
    #[error("no upload in progress for {0}")]
    NotFound(String),

    /// An active record already exists, or a field that must not change did
    #[error("conflict: {0}")]
    Conflict(String),

    /// The chunk index cannot follow from the current progress record
    #[error("out-of-order chunk {got} for {file_name} (current high-water mark {current})")]
    OutOfOrderChunk {
        file_name: String,
        got: u32,
        current: u32,
    },

    /// Invalid logical file name
    #[error(transparent)]
    InvalidFileName(#[from] FileNameError),

    #[error("failed to write chunk: {0}")]
    ChunkWrite(std::io::Error),
    #[error("failed to read chunk: {0}")]
    ChunkRead(std::io::Error),
    #[error("failed to merge chunks: {0}")]
    Merge(std::io::Error),
    #[error("failed to create upload directory: {0}")]
    UploadDirCreation(std::io::Error),

    /// Progress store failure
    #[error("progress store error: {0}")]
    Store(#[from] StoreError),
}

pub type UploadResult<T> = std::result::Result<T, UploadError>;
