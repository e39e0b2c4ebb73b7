//! Filesystem-backed progress store.

use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::{ProgressStore, StoreError, StoreResult, UploadStatus};

/// A [`ProgressStore`] keeping one JSON document per record under a state
/// directory.
///
/// Layout: `<state_dir>/<file_name>.json`. Records are written to a
/// temporary sibling and renamed into place so a crash mid-write never
/// leaves a truncated document behind. Resume-after-restart works because
/// the documents outlive the process.
///
/// File names are expected to be pre-validated (no path separators); the
/// upload engine only hands this store names that came through the
/// `FileName` type.
#[derive(Debug)]
pub struct JsonFileStore {
    state_dir: PathBuf,
}

impl JsonFileStore {
    /// Opens (and creates if needed) a store rooted at `state_dir`.
    pub fn open(state_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let state_dir = state_dir.into();
        fs::create_dir_all(&state_dir)?;
        Ok(Self { state_dir })
    }

    fn record_path(&self, file_name: &str) -> PathBuf {
        self.state_dir.join(format!("{file_name}.json"))
    }

    fn read_record(&self, path: &Path) -> StoreResult<UploadStatus> {
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes).map_err(StoreError::Deserialization)
    }

    fn write_record(&self, record: &UploadStatus) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(record).map_err(StoreError::Serialization)?;
        let path = self.record_path(&record.file_name);
        let tmp = self.state_dir.join(format!(".{}.json.tmp", record.file_name));
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl ProgressStore for JsonFileStore {
    fn create(&self, record: &UploadStatus) -> StoreResult<()> {
        if self.record_path(&record.file_name).exists() {
            return Err(StoreError::Duplicate(record.file_name.clone()));
        }
        self.write_record(record)
    }

    fn load(&self, file_name: &str) -> StoreResult<Option<UploadStatus>> {
        let path = self.record_path(file_name);
        if !path.exists() {
            return Ok(None);
        }
        self.read_record(&path).map(Some)
    }

    fn update(&self, record: &UploadStatus) -> StoreResult<()> {
        if !self.record_path(&record.file_name).exists() {
            return Err(StoreError::Missing(record.file_name.clone()));
        }
        self.write_record(record)
    }

    fn delete(&self, file_name: &str) -> StoreResult<bool> {
        let path = self.record_path(file_name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_by_id(&self, id: Uuid) -> StoreResult<bool> {
        for record in self.list()? {
            if record.id == id {
                return self.delete(&record.file_name);
            }
        }
        Ok(false)
    }

    fn list(&self) -> StoreResult<Vec<UploadStatus>> {
        let mut records = Vec::new();
        for entry in fs::read_dir(&self.state_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.read_record(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    // A torn or foreign file must not make every upload fail.
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable progress record");
                }
            }
        }
        Ok(records)
    }
}
