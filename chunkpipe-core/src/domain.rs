// chunkpipe_core/src/domain.rs
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address of one object in the blob store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// The object being split. Owned by the blob store; never written by the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceObject {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

impl SourceObject {
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.key.clone())
    }
}

/// Inclusive byte range `[start, end]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDescriptor {
    pub bucket: String,
    pub key: String,
    pub chunk_number: u32,
    pub start_byte: u64,
    pub end_byte: u64,
    pub total_chunks: u32,
}

impl ChunkDescriptor {
    pub fn size(&self) -> u64 {
        self.byte_range().len()
    }

    pub fn byte_range(&self) -> ByteRange {
        ByteRange {
            start: self.start_byte,
            end: self.end_byte,
        }
    }

    pub fn source_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.key.clone())
    }
}

/// What a chunk processor hands back to the orchestrator. Carries no record payloads.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkResult {
    pub chunk_number: u32,
    pub bucket: String,
    #[serde(alias = "original_key")]
    pub source_key: String,
    pub data_key: String,
    #[serde(alias = "objects_found")]
    pub record_count: u64,
    pub byte_range: ByteRange,
}

impl ChunkResult {
    pub fn source_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.source_key.clone())
    }

    pub fn data_ref(&self) -> ObjectRef {
        ObjectRef::new(self.bucket.clone(), self.data_key.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_result_accepts_wire_aliases() {
        let raw = r#"{
            "chunk_number": 2,
            "bucket": "recipes",
            "original_key": "uploads/big.json",
            "data_key": "processed/data/big_chunk_2_data.json",
            "objects_found": 11,
            "byte_range": {"start": 200, "end": 249}
        }"#;
        let r: ChunkResult = serde_json::from_str(raw).unwrap();
        assert_eq!(r.source_key, "uploads/big.json");
        assert_eq!(r.record_count, 11);
        assert_eq!(r.byte_range.len(), 50);
    }

    #[test]
    fn test_object_ref_display() {
        let o = ObjectRef::new("b", "uploads/x.json");
        assert_eq!(o.to_string(), "s3://b/uploads/x.json");
    }
}
