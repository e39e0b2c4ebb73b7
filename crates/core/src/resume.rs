//! Resume offset query.

use std::fs;

use chunkd_types::FileName;

use crate::{ChunkAssembler, UploadResult};

impl ChunkAssembler {
    /// Reports the chunk index the client should send next for `file_name`.
    ///
    /// If an upload is in progress this returns the current high-water mark:
    /// the protocol treats the last acknowledged chunk as not trustworthy
    /// enough to skip, so the client re-sends it. The possibly-partial chunk
    /// file for that index is deleted first, so the retry starts from a
    /// clean slate. With no record the answer is `1` — start from the
    /// beginning.
    ///
    /// Runs under the same per-name lock as chunk receipt, so a resume query
    /// can never delete a chunk file out from under an in-flight merge.
    pub fn resume_offset(&self, file_name: &FileName) -> UploadResult<u32> {
        self.locks().with_lock(file_name.as_str(), || {
            let Some(record) = self.tracker().find(file_name)? else {
                return Ok(1);
            };

            let partial = self.config().chunk_path(record.chunk, file_name);
            match fs::remove_file(&partial) {
                Ok(()) => {
                    tracing::debug!(
                        file_name = %file_name,
                        chunk = record.chunk,
                        "dropped possibly-partial chunk before resume"
                    );
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(
                        path = %partial.display(),
                        error = %e,
                        "failed to drop partial chunk before resume"
                    );
                }
            }

            Ok(record.chunk)
        })
    }
}
