pub mod manifest;

use std::collections::HashSet;
use std::sync::Arc;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::config::PipelineConfig;
use crate::domain::{ChunkResult, ObjectRef, SourceObject};
use crate::error::{PipelineError, Result};
use crate::keys::{SUMMARY_ENTRY, archive_key, chunk_entry_name};
use crate::pack::writer::{NamedEntry, PackOptions, pack};
use manifest::{ArchiveManifest, Omission};

#[derive(Clone, Debug, Default)]
pub struct MergeOptions {
    pub pack: PackOptions,
    /// Delete each merged record set after the archive is persisted.
    pub cleanup_chunk_data: bool,
}

impl From<&PipelineConfig> for MergeOptions {
    fn from(cfg: &PipelineConfig) -> Self {
        Self {
            pack: PackOptions {
                deterministic: cfg.deterministic,
                min_gain: cfg.min_gain,
            },
            cleanup_chunk_data: cfg.cleanup_chunk_data,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct MergeReport {
    pub archive: ObjectRef,
    pub manifest: ArchiveManifest,
}

/// Folds every chunk's record set, in chunk order, into one archive.
pub struct Merger {
    store: Arc<dyn BlobStore>,
    opts: MergeOptions,
}

impl Merger {
    pub fn new(store: Arc<dyn BlobStore>, opts: MergeOptions) -> Self {
        Self { store, opts }
    }

    pub fn merge(&self, results: &[ChunkResult], source: &SourceObject) -> Result<MergeReport> {
        if results.is_empty() {
            return Err(PipelineError::NoResults);
        }
        let expected = source.object_ref();
        if let Some(r) = results.iter().find(|r| r.source_ref() != expected) {
            return Err(PipelineError::SourceMismatch {
                expected: expected.to_string(),
                found: r.source_ref().to_string(),
            });
        }

        let mut sorted: Vec<&ChunkResult> = results.iter().collect();
        sorted.sort_by_key(|r| r.chunk_number);
        let mut seen = HashSet::with_capacity(sorted.len());
        for r in &sorted {
            if !seen.insert(r.chunk_number) {
                return Err(PipelineError::DuplicateChunk(r.chunk_number));
            }
        }

        let started = if self.opts.pack.deterministic {
            OffsetDateTime::UNIX_EPOCH
        } else {
            OffsetDateTime::now_utc()
        };
        let start_time = started
            .format(&Rfc3339)
            .map_err(|e| PipelineError::Format(format!("start time: {e}")))?;

        let mut entries = Vec::with_capacity(sorted.len() + 1);
        let mut omitted = Vec::new();
        for r in &sorted {
            match self.store.get(&r.data_ref()) {
                Ok(data) => {
                    debug!(chunk = r.chunk_number, bytes = data.len(), "read record set");
                    entries.push(NamedEntry::new(chunk_entry_name(r.chunk_number), data));
                }
                Err(e) => {
                    warn!(
                        chunk = r.chunk_number,
                        data_key = %r.data_key,
                        error = %e,
                        "record set unreadable, omitting chunk from archive"
                    );
                    omitted.push(Omission {
                        chunk_number: r.chunk_number,
                        data_key: r.data_key.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let manifest =
            ArchiveManifest::build(source, start_time, started.unix_timestamp(), &sorted, omitted);
        entries.insert(
            0,
            NamedEntry::new(SUMMARY_ENTRY, serde_json::to_vec_pretty(&manifest)?),
        );

        let image = pack(&entries, &self.opts.pack)?;
        let archive = ObjectRef::new(source.bucket.clone(), archive_key(&source.key));
        self.store
            .put(&archive, &image)
            .map_err(|e| PipelineError::Persist {
                bucket: archive.bucket.clone(),
                key: archive.key.clone(),
                source: e,
            })?;

        info!(
            archive = %archive,
            bytes = image.len(),
            chunks = manifest.processing.total_chunks,
            records = manifest.processing.total_records,
            omitted = manifest.omitted.len(),
            "archive written"
        );

        if self.opts.cleanup_chunk_data {
            self.cleanup(&manifest, &sorted);
        }

        Ok(MergeReport { archive, manifest })
    }

    fn cleanup(&self, manifest: &ArchiveManifest, sorted: &[&ChunkResult]) {
        for (summary, r) in manifest.chunks.iter().zip(sorted) {
            if !summary.included {
                continue;
            }
            if let Err(e) = self.store.delete(&r.data_ref()) {
                warn!(data_key = %r.data_key, error = %e, "could not delete merged record set");
            }
        }
    }
}
