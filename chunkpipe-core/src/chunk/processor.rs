use std::sync::Arc;

use tracing::{debug, info};

use super::scan::RecordSet;
use crate::blob::BlobStore;
use crate::domain::{ChunkDescriptor, ChunkResult, ObjectRef};
use crate::error::{PipelineError, Result};
use crate::keys::chunk_data_key;

/// Reads one chunk's byte range, recovers its records, and persists them
/// under a key derived from (source key, chunk number).
pub struct ChunkProcessor {
    store: Arc<dyn BlobStore>,
}

impl ChunkProcessor {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    pub fn process(&self, d: &ChunkDescriptor) -> Result<ChunkResult> {
        if d.start_byte > d.end_byte {
            return Err(PipelineError::InvalidConfiguration(format!(
                "chunk {} has an inverted range {}-{}",
                d.chunk_number, d.start_byte, d.end_byte
            )));
        }
        let source = d.source_ref();
        let raw = self
            .store
            .get_range(&source, d.start_byte, d.end_byte)
            .map_err(|e| PipelineError::RangeRead {
                chunk_number: d.chunk_number,
                bucket: d.bucket.clone(),
                key: d.key.clone(),
                start: d.start_byte,
                end: d.end_byte,
                source: e,
            })?;
        debug!(chunk = d.chunk_number, bytes = raw.len(), "read chunk range");

        let records = RecordSet::scan(&raw);
        let payload = records.to_bytes()?;

        let data = ObjectRef::new(d.bucket.clone(), chunk_data_key(&d.key, d.chunk_number));
        self.store
            .put(&data, &payload)
            .map_err(|e| PipelineError::Persist {
                bucket: data.bucket.clone(),
                key: data.key.clone(),
                source: e,
            })?;

        info!(
            chunk = d.chunk_number,
            of = d.total_chunks,
            records = records.len(),
            data = %data,
            "processed chunk"
        );

        Ok(ChunkResult {
            chunk_number: d.chunk_number,
            bucket: d.bucket.clone(),
            source_key: d.key.clone(),
            data_key: data.key,
            record_count: records.len() as u64,
            byte_range: d.byte_range(),
        })
    }
}
