//! Chunk persistence and ordered reassembly.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chunkd_store::UploadStatus;
use chunkd_types::FileName;

use crate::{FileLockMap, UploadConfig, UploadError, UploadResult, UploadTracker};

/// Receives chunks, persists them, advances the tracker, and merges the
/// final artifact when the last chunk arrives.
///
/// All work for one file name happens under that name's lock, so concurrent
/// requests for the same upload cannot interleave tracker updates or trigger
/// the merge twice. Uploads of different files proceed in parallel.
pub struct ChunkAssembler {
    config: Arc<UploadConfig>,
    tracker: UploadTracker,
    locks: FileLockMap,
}

impl ChunkAssembler {
    pub fn new(config: Arc<UploadConfig>, tracker: UploadTracker) -> Self {
        Self {
            config,
            tracker,
            locks: FileLockMap::new(),
        }
    }

    pub fn config(&self) -> &UploadConfig {
        &self.config
    }

    pub fn tracker(&self) -> &UploadTracker {
        &self.tracker
    }

    pub(crate) fn locks(&self) -> &FileLockMap {
        &self.locks
    }

    /// Accepts one chunk of an upload.
    ///
    /// `chunk` is the 1-based index; `None` means a single-shot, non-chunked
    /// upload written straight to the final path. When `chunk` is present,
    /// `chunks` (the declared total) is required and must match the total of
    /// any existing record for the name.
    ///
    /// Sequencing: for a record standing at chunk `k`, the accepted indices
    /// are `1` (fresh start or explicit restart-from-scratch), `k` (retry of
    /// the last acknowledged chunk, as the resume protocol instructs), and
    /// `k + 1`. Any other index — including any chunk > 1 when no record
    /// exists — fails with [`UploadError::OutOfOrderChunk`] and writes
    /// nothing.
    ///
    /// When the final chunk lands, all chunks are concatenated in index
    /// order into a staging file which is atomically renamed onto the final
    /// path; only after that commit are the chunk files and the progress
    /// record removed.
    pub fn receive_chunk(
        &self,
        file_name: &FileName,
        chunk: Option<u32>,
        chunks: Option<u32>,
        payload: &[u8],
    ) -> UploadResult<()> {
        if payload.len() as u64 > self.config.max_chunk_bytes() {
            return Err(UploadError::MalformedRequest(format!(
                "chunk payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.config.max_chunk_bytes()
            )));
        }

        let Some(index) = chunk else {
            // Single-shot upload: no tracker record, same atomic commit path.
            return self.locks.with_lock(file_name.as_str(), || {
                self.commit_bytes(file_name, payload)
            });
        };

        let total = chunks.ok_or_else(|| {
            UploadError::MalformedRequest("field 'chunks' is required when 'chunk' is present".into())
        })?;
        if index == 0 || total == 0 {
            return Err(UploadError::MalformedRequest(
                "chunk indices are 1-based and the total must be positive".into(),
            ));
        }
        if index > total {
            return Err(UploadError::MalformedRequest(format!(
                "chunk {index} exceeds declared total {total}"
            )));
        }

        self.locks.with_lock(file_name.as_str(), || {
            self.receive_chunk_locked(file_name, index, total, payload)
        })
    }

    fn receive_chunk_locked(
        &self,
        file_name: &FileName,
        index: u32,
        total: u32,
        payload: &[u8],
    ) -> UploadResult<()> {
        let existing = self.tracker.find(file_name)?;

        if let Some(record) = &existing {
            if record.chunks != total {
                return Err(UploadError::Conflict(format!(
                    "declared total {total} does not match the {} chunks the upload for {file_name} was started with",
                    record.chunks
                )));
            }
        }
        self.check_sequencing(file_name, index, existing.as_ref())?;

        fs::write(self.config.chunk_path(index, file_name), payload)
            .map_err(UploadError::ChunkWrite)?;

        match existing {
            Some(_) => self.tracker.advance(file_name, index)?,
            None => {
                self.tracker.begin(file_name, index, total)?;
            }
        }

        if index == total {
            self.merge(file_name, total)?;
        }
        Ok(())
    }

    fn check_sequencing(
        &self,
        file_name: &FileName,
        index: u32,
        existing: Option<&UploadStatus>,
    ) -> UploadResult<()> {
        let current = existing.map(|r| r.chunk).unwrap_or(0);
        let accepted = match existing {
            // Restart from scratch, retry of the last acked chunk, or the
            // next chunk in sequence.
            Some(record) => index == 1 || index == record.chunk || index == record.chunk + 1,
            None => index == 1,
        };
        if accepted {
            Ok(())
        } else {
            Err(UploadError::OutOfOrderChunk {
                file_name: file_name.to_string(),
                got: index,
                current,
            })
        }
    }

    /// Concatenates chunks `1..=total` in index order into the final
    /// artifact.
    ///
    /// The output is written to a staging file, fsynced, and renamed onto
    /// the final path. Chunk files and the progress record are only removed
    /// after the rename commits, so a failed merge leaves its inputs
    /// unchanged and can be retried.
    fn merge(&self, file_name: &FileName, total: u32) -> UploadResult<()> {
        let staging = self.config.staging_path(file_name);

        if let Err(e) = self.write_merged(&staging, file_name, total) {
            // Best effort: do not leave a stale staging file behind.
            let _ = fs::remove_file(&staging);
            return Err(e);
        }

        fs::rename(&staging, self.config.final_path(file_name)).map_err(UploadError::Merge)?;

        for index in 1..=total {
            let chunk_path = self.config.chunk_path(index, file_name);
            if let Err(e) = fs::remove_file(&chunk_path) {
                tracing::warn!(
                    path = %chunk_path.display(),
                    error = %e,
                    "failed to remove chunk file after merge"
                );
            }
        }
        self.tracker.remove(file_name)?;

        tracing::info!(file_name = %file_name, chunks = total, "upload merged");
        Ok(())
    }

    fn write_merged(&self, staging: &Path, file_name: &FileName, total: u32) -> UploadResult<()> {
        let mut output = fs::File::create(staging).map_err(UploadError::Merge)?;
        for index in 1..=total {
            let bytes =
                fs::read(self.config.chunk_path(index, file_name)).map_err(UploadError::ChunkRead)?;
            output.write_all(&bytes).map_err(UploadError::Merge)?;
        }
        output.flush().map_err(UploadError::Merge)?;
        output.sync_all().map_err(UploadError::Merge)?;
        Ok(())
    }

    /// Writes `payload` to the final path through the staging + rename path.
    fn commit_bytes(&self, file_name: &FileName, payload: &[u8]) -> UploadResult<()> {
        let staging = self.config.staging_path(file_name);
        let write = || -> std::io::Result<()> {
            let mut output = fs::File::create(&staging)?;
            output.write_all(payload)?;
            output.sync_all()
        };
        if let Err(e) = write() {
            let _ = fs::remove_file(&staging);
            return Err(UploadError::ChunkWrite(e));
        }
        fs::rename(&staging, self.config.final_path(file_name)).map_err(UploadError::Merge)?;
        tracing::info!(file_name = %file_name, bytes = payload.len(), "single-shot upload stored");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkd_store::MemoryStore;
    use tempfile::TempDir;

    fn assembler(dir: &TempDir) -> ChunkAssembler {
        let config = UploadConfig::new(dir.path().to_path_buf(), 1024 * 1024).unwrap();
        let tracker = UploadTracker::new(Arc::new(MemoryStore::new()));
        ChunkAssembler::new(Arc::new(config), tracker)
    }

    fn name(s: &str) -> FileName {
        FileName::new(s).unwrap()
    }

    #[test]
    fn merges_chunks_in_index_order() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("video.mp4");

        asm.receive_chunk(&file, Some(1), Some(3), b"AAAA").unwrap();
        asm.receive_chunk(&file, Some(2), Some(3), b"BB").unwrap();
        asm.receive_chunk(&file, Some(3), Some(3), b"CCCCCC").unwrap();

        let merged = fs::read(dir.path().join("video.mp4")).unwrap();
        assert_eq!(&merged, b"AAAABBCCCCCC");
    }

    #[test]
    fn post_merge_cleanup() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("out.bin");

        asm.receive_chunk(&file, Some(1), Some(2), b"one").unwrap();
        asm.receive_chunk(&file, Some(2), Some(2), b"two").unwrap();

        assert!(!dir.path().join("1_out.bin").exists());
        assert!(!dir.path().join("2_out.bin").exists());
        assert!(!dir.path().join(".out.bin.merge").exists());
        assert!(asm.tracker().find(&file).unwrap().is_none());
        // A completed name reads as a fresh upload.
        assert_eq!(asm.resume_offset(&file).unwrap(), 1);
    }

    #[test]
    fn first_chunk_must_be_one() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        let result = asm.receive_chunk(&file, Some(2), Some(4), b"x");
        assert!(matches!(
            result,
            Err(UploadError::OutOfOrderChunk { got: 2, current: 0, .. })
        ));
        assert!(!dir.path().join("2_a.bin").exists());
    }

    #[test]
    fn rejects_gap_in_sequence() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        asm.receive_chunk(&file, Some(1), Some(4), b"x").unwrap();
        let result = asm.receive_chunk(&file, Some(3), Some(4), b"y");
        assert!(matches!(
            result,
            Err(UploadError::OutOfOrderChunk { got: 3, current: 1, .. })
        ));
    }

    #[test]
    fn accepts_retry_of_last_acked_chunk() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        asm.receive_chunk(&file, Some(1), Some(3), b"first").unwrap();
        asm.receive_chunk(&file, Some(2), Some(3), b"garbled").unwrap();
        // Client re-sends chunk 2 after a resume query.
        asm.receive_chunk(&file, Some(2), Some(3), b"second").unwrap();
        asm.receive_chunk(&file, Some(3), Some(3), b"third").unwrap();

        let merged = fs::read(dir.path().join("a.bin")).unwrap();
        assert_eq!(&merged, b"firstsecondthird");
    }

    #[test]
    fn chunk_one_restarts_existing_upload() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        asm.receive_chunk(&file, Some(1), Some(4), b"x").unwrap();
        asm.receive_chunk(&file, Some(2), Some(4), b"y").unwrap();
        let id_before = asm.tracker().find(&file).unwrap().unwrap().id;

        asm.receive_chunk(&file, Some(1), Some(4), b"x2").unwrap();

        let record = asm.tracker().find(&file).unwrap().unwrap();
        assert_eq!(record.chunk, 1);
        // Restart reuses the record rather than creating a new upload.
        assert_eq!(record.id, id_before);
        assert_eq!(asm.resume_offset(&file).unwrap(), 1);
    }

    #[test]
    fn declared_total_is_immutable() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        asm.receive_chunk(&file, Some(1), Some(4), b"x").unwrap();
        let result = asm.receive_chunk(&file, Some(2), Some(5), b"y");
        assert!(matches!(result, Err(UploadError::Conflict(_))));
    }

    #[test]
    fn chunk_requires_declared_total() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let result = asm.receive_chunk(&name("a.bin"), Some(1), None, b"x");
        assert!(matches!(result, Err(UploadError::MalformedRequest(_))));
    }

    #[test]
    fn rejects_zero_and_overflowing_indices() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        assert!(matches!(
            asm.receive_chunk(&file, Some(0), Some(4), b"x"),
            Err(UploadError::MalformedRequest(_))
        ));
        assert!(matches!(
            asm.receive_chunk(&file, Some(5), Some(4), b"x"),
            Err(UploadError::MalformedRequest(_))
        ));
        assert!(matches!(
            asm.receive_chunk(&file, Some(1), Some(0), b"x"),
            Err(UploadError::MalformedRequest(_))
        ));
    }

    #[test]
    fn rejects_oversized_payload() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig::new(dir.path().to_path_buf(), 8).unwrap();
        let tracker = UploadTracker::new(Arc::new(MemoryStore::new()));
        let asm = ChunkAssembler::new(Arc::new(config), tracker);

        let result = asm.receive_chunk(&name("a.bin"), Some(1), Some(2), b"123456789");
        assert!(matches!(result, Err(UploadError::MalformedRequest(_))));
    }

    #[test]
    fn single_shot_upload_writes_final_file() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("whole.txt");

        asm.receive_chunk(&file, None, None, b"entire payload").unwrap();

        let written = fs::read(dir.path().join("whole.txt")).unwrap();
        assert_eq!(&written, b"entire payload");
        assert!(asm.tracker().find(&file).unwrap().is_none());
    }

    #[test]
    fn failed_merge_leaves_no_partial_artifact() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        asm.receive_chunk(&file, Some(1), Some(3), b"one").unwrap();
        asm.receive_chunk(&file, Some(2), Some(3), b"two").unwrap();
        // Sabotage: chunk 2 disappears before the final chunk arrives.
        fs::remove_file(dir.path().join("2_a.bin")).unwrap();

        let result = asm.receive_chunk(&file, Some(3), Some(3), b"three");
        assert!(matches!(result, Err(UploadError::ChunkRead(_))));

        // No partial final file, no staging leftover, record still present
        // so the upload stays retryable.
        assert!(!dir.path().join("a.bin").exists());
        assert!(!dir.path().join(".a.bin.merge").exists());
        assert_eq!(asm.tracker().find(&file).unwrap().unwrap().chunk, 3);
    }

    #[test]
    fn resume_is_monotonic_over_prefixes() {
        let dir = TempDir::new().unwrap();
        let asm = assembler(&dir);
        let file = name("a.bin");

        assert_eq!(asm.resume_offset(&file).unwrap(), 1);
        asm.receive_chunk(&file, Some(1), Some(4), b"1").unwrap();
        assert_eq!(asm.resume_offset(&file).unwrap(), 1);
        asm.receive_chunk(&file, Some(1), Some(4), b"1").unwrap();
        asm.receive_chunk(&file, Some(2), Some(4), b"2").unwrap();
        assert_eq!(asm.resume_offset(&file).unwrap(), 2);
        asm.receive_chunk(&file, Some(2), Some(4), b"2").unwrap();
        asm.receive_chunk(&file, Some(3), Some(4), b"3").unwrap();
        assert_eq!(asm.resume_offset(&file).unwrap(), 3);
    }

    #[test]
    fn resume_survives_process_restart() {
        use chunkd_store::JsonFileStore;

        let dir = TempDir::new().unwrap();
        let upload_dir = dir.path().join("uploads");
        let state_dir = dir.path().join("state");
        let file = name("big.iso");

        {
            let config = UploadConfig::new(upload_dir.clone(), 1024 * 1024).unwrap();
            let tracker =
                UploadTracker::new(Arc::new(JsonFileStore::open(&state_dir).unwrap()));
            let asm = ChunkAssembler::new(Arc::new(config), tracker);
            asm.receive_chunk(&file, Some(1), Some(3), b"one").unwrap();
            asm.receive_chunk(&file, Some(2), Some(3), b"two").unwrap();
        }

        // "Restart": fresh services over the same directories.
        let config = UploadConfig::new(upload_dir.clone(), 1024 * 1024).unwrap();
        let tracker = UploadTracker::new(Arc::new(JsonFileStore::open(&state_dir).unwrap()));
        let asm = ChunkAssembler::new(Arc::new(config), tracker);

        let off = asm.resume_offset(&file).unwrap();
        assert_eq!(off, 2);
        asm.receive_chunk(&file, Some(off), Some(3), b"two").unwrap();
        asm.receive_chunk(&file, Some(3), Some(3), b"three").unwrap();

        let merged = fs::read(upload_dir.join("big.iso")).unwrap();
        assert_eq!(&merged, b"onetwothree");
    }

    #[test]
    fn concurrent_final_chunks_merge_exactly_once() {
        use std::thread;

        let dir = TempDir::new().unwrap();
        let asm = Arc::new(assembler(&dir));
        let file = name("race.bin");

        asm.receive_chunk(&file, Some(1), Some(3), b"1111").unwrap();
        asm.receive_chunk(&file, Some(2), Some(3), b"2222").unwrap();

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let asm = asm.clone();
                let file = file.clone();
                thread::spawn(move || asm.receive_chunk(&file, Some(3), Some(3), b"3333"))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        // One request wins and merges; the loser either also observed a
        // clean retry (record still at 3) or found the record gone and was
        // rejected as out of order. Either way the artifact is intact.
        assert!(results.iter().any(|r| r.is_ok()));
        let merged = fs::read(dir.path().join("race.bin")).unwrap();
        assert_eq!(&merged, b"111122223333");
        assert!(!dir.path().join("3_race.bin").exists());
    }
}
