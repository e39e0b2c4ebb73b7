//! Upload engine configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! the services that need it. Request handling never reads process-wide
//! environment variables; the composing binary owns that lifecycle.

use std::path::{Path, PathBuf};

use chunkd_types::FileName;

use crate::{UploadError, UploadResult};

/// Default per-chunk payload ceiling: 64 MiB.
pub const DEFAULT_MAX_CHUNK_BYTES: u64 = 64 * 1024 * 1024;

/// Configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    upload_dir: PathBuf,
    max_chunk_bytes: u64,
}

impl UploadConfig {
    /// Creates a config rooted at `upload_dir`, creating the directory if it
    /// does not exist.
    pub fn new(upload_dir: PathBuf, max_chunk_bytes: u64) -> UploadResult<Self> {
        if max_chunk_bytes == 0 {
            return Err(UploadError::MalformedRequest(
                "max_chunk_bytes cannot be zero".into(),
            ));
        }
        std::fs::create_dir_all(&upload_dir).map_err(UploadError::UploadDirCreation)?;
        Ok(Self {
            upload_dir,
            max_chunk_bytes,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Maximum accepted payload size for a single chunk, in bytes.
    pub fn max_chunk_bytes(&self) -> u64 {
        self.max_chunk_bytes
    }

    /// Path of an in-flight chunk file: `<upload_dir>/<index>_<name>`.
    pub fn chunk_path(&self, chunk: u32, name: &FileName) -> PathBuf {
        self.upload_dir.join(format!("{chunk}_{name}"))
    }

    /// Path of the completed artifact: `<upload_dir>/<name>`.
    pub fn final_path(&self, name: &FileName) -> PathBuf {
        self.upload_dir.join(name.as_str())
    }

    /// Path of the merge staging file. Dotted so it can never collide with a
    /// validated file name, and a sibling of the final path so the commit
    /// rename stays on one filesystem.
    pub fn staging_path(&self, name: &FileName) -> PathBuf {
        self.upload_dir.join(format!(".{name}.merge"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn creates_upload_dir() {
        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("nested").join("uploads");
        let config = UploadConfig::new(upload_dir.clone(), DEFAULT_MAX_CHUNK_BYTES).unwrap();
        assert!(upload_dir.is_dir());
        assert_eq!(config.upload_dir(), upload_dir);
    }

    #[test]
    fn rejects_zero_chunk_limit() {
        let dir = TempDir::new().unwrap();
        let result = UploadConfig::new(dir.path().to_path_buf(), 0);
        assert!(matches!(result, Err(UploadError::MalformedRequest(_))));
    }

    #[test]
    fn path_layout() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig::new(dir.path().to_path_buf(), 1024).unwrap();
        let name = FileName::new("video.mp4").unwrap();

        assert_eq!(config.chunk_path(3, &name), dir.path().join("3_video.mp4"));
        assert_eq!(config.final_path(&name), dir.path().join("video.mp4"));
        assert_eq!(
            config.staging_path(&name),
            dir.path().join(".video.mp4.merge")
        );
    }
}
