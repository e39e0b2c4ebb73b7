//! # chunkd core
//!
//! The resumable upload engine: chunk persistence, progress tracking, and
//! ordered reassembly into the final artifact.
//!
//! A client splits a file into 1-based numbered chunks and uploads them one
//! at a time, possibly across connections and process restarts. The engine
//! keeps a durable high-water-mark record per logical file name (via
//! `chunkd-store`), stores each chunk at `<upload_dir>/<index>_<name>`, and
//! when the final chunk arrives concatenates all chunks in index order into
//! `<upload_dir>/<name>`.
//!
//! Delivery is strictly sequential: for an upload whose record stands at
//! chunk `k`, the engine accepts chunk `1` (fresh start or explicit
//! restart), `k` (retry of the last acknowledged chunk — the resume
//! protocol asks clients to re-send it), or `k + 1`. Anything else is
//! rejected without touching disk.
//!
//! All operations for one file name are serialised behind a per-name lock;
//! uploads of unrelated files never contend.
//!
//! **No API concerns**: HTTP parsing and response shaping live in
//! `api-rest`; process composition lives in the `chunkd-run` binary.

mod assembler;
mod config;
mod error;
mod locks;
mod resume;
mod tracker;

pub use assembler::ChunkAssembler;
pub use config::{UploadConfig, DEFAULT_MAX_CHUNK_BYTES};
pub use error::{UploadError, UploadResult};
pub use locks::FileLockMap;
pub use tracker::UploadTracker;

pub use chunkd_store::UploadStatus;
pub use chunkd_types::FileName;
