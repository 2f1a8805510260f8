use serde::{Deserialize, Serialize};

use crate::domain::{ByteRange, ChunkResult, SourceObject};
use crate::keys::file_name;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalFile {
    pub name: String,
    pub bucket: String,
    pub key: String,
    pub path: String,
    pub size: u64,
    pub size_human: String,
}

impl From<&SourceObject> for OriginalFile {
    fn from(s: &SourceObject) -> Self {
        Self {
            name: file_name(&s.key).to_string(),
            bucket: s.bucket.clone(),
            key: s.key.clone(),
            path: s.object_ref().to_string(),
            size: s.size,
            size_human: format_size(s.size),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Processing {
    /// RFC 3339, UTC.
    pub start_time: String,
    pub start_unix: i64,
    /// Number of chunk results handed to the merge.
    pub planned_chunks: u32,
    /// Chunks whose record sets are in the archive.
    pub total_chunks: u32,
    /// Sum of record counts over the chunks in the archive.
    pub total_records: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSummary {
    pub chunk_number: u32,
    pub record_count: u64,
    pub byte_range: ByteRange,
    pub included: bool,
}

/// A chunk whose record set could not be read back at merge time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Omission {
    pub chunk_number: u32,
    pub data_key: String,
    pub reason: String,
}

/// Summary written as the first archive entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub original_file: OriginalFile,
    pub processing: Processing,
    /// Every chunk result, ascending chunk number.
    pub chunks: Vec<ChunkSummary>,
    pub omitted: Vec<Omission>,
}

impl ArchiveManifest {
    /// `sorted` must be ordered by chunk number; `omitted` names the chunks left out.
    pub fn build(
        source: &SourceObject,
        start_time: String,
        start_unix: i64,
        sorted: &[&ChunkResult],
        omitted: Vec<Omission>,
    ) -> Self {
        let is_omitted = |n: u32| omitted.iter().any(|o| o.chunk_number == n);
        let chunks: Vec<ChunkSummary> = sorted
            .iter()
            .map(|r| ChunkSummary {
                chunk_number: r.chunk_number,
                record_count: r.record_count,
                byte_range: r.byte_range,
                included: !is_omitted(r.chunk_number),
            })
            .collect();
        let included = chunks.iter().filter(|c| c.included);
        let total_chunks = included.clone().count() as u32;
        let total_records = included.map(|c| c.record_count).sum();

        Self {
            original_file: OriginalFile::from(source),
            processing: Processing {
                start_time,
                start_unix,
                planned_chunks: sorted.len() as u32,
                total_chunks,
                total_records,
            },
            chunks,
            omitted,
        }
    }
}

/// Human-readable byte count: `1.50 KB`, `50.00 MB`.
pub fn format_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} TB")
}
