use std::sync::Arc;

use tracing::info;

use crate::blob::BlobStore;
use crate::domain::{ChunkDescriptor, ObjectRef, SourceObject};
use crate::error::{PipelineError, Result};

/// Cut `source` into contiguous inclusive ranges of at most `chunk_size` bytes.
///
/// Pure: the same inputs always give the same descriptors. A zero-byte source
/// yields no descriptors.
pub fn plan(source: &SourceObject, chunk_size: u64) -> Result<Vec<ChunkDescriptor>> {
    if chunk_size == 0 {
        return Err(PipelineError::InvalidConfiguration(
            "chunk_size must be greater than zero".into(),
        ));
    }
    let total_size = source.size;
    let total_chunks = u32::try_from(total_size.div_ceil(chunk_size)).map_err(|_| {
        PipelineError::InvalidConfiguration(format!(
            "chunk_size {chunk_size} splits {total_size} bytes into more than {} chunks",
            u32::MAX
        ))
    })?;

    let descriptors = (0..total_chunks)
        .map(|i| {
            let start = u64::from(i) * chunk_size;
            let end = start.saturating_add(chunk_size - 1).min(total_size - 1);
            ChunkDescriptor {
                bucket: source.bucket.clone(),
                key: source.key.clone(),
                chunk_number: i,
                start_byte: start,
                end_byte: end,
                total_chunks,
            }
        })
        .collect();
    Ok(descriptors)
}

/// Looks up the object's size and plans its chunks. Never reads object content.
pub struct Splitter {
    store: Arc<dyn BlobStore>,
    chunk_size: u64,
}

impl Splitter {
    pub fn new(store: Arc<dyn BlobStore>, chunk_size: u64) -> Self {
        Self { store, chunk_size }
    }

    pub fn split(&self, obj: &ObjectRef) -> Result<(SourceObject, Vec<ChunkDescriptor>)> {
        let size = self.store.head(obj)?;
        let source = SourceObject {
            bucket: obj.bucket.clone(),
            key: obj.key.clone(),
            size,
        };
        let descriptors = plan(&source, self.chunk_size)?;
        info!(
            object = %obj,
            size,
            chunk_size = self.chunk_size,
            chunks = descriptors.len(),
            "planned chunks"
        );
        Ok((source, descriptors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::mem::MemStore;

    fn src(size: u64) -> SourceObject {
        SourceObject {
            bucket: "b".into(),
            key: "uploads/x.json".into(),
            size,
        }
    }

    #[test]
    fn test_plan_250_by_100() {
        let d = plan(&src(250), 100).unwrap();
        let ranges: Vec<_> = d
            .iter()
            .map(|c| (c.chunk_number, c.start_byte, c.end_byte))
            .collect();
        assert_eq!(ranges, vec![(0, 0, 99), (1, 100, 199), (2, 200, 249)]);
        assert!(d.iter().all(|c| c.total_chunks == 3));
        assert_eq!(d[2].size(), 50);
    }

    #[test]
    fn test_plan_empty_source() {
        assert!(plan(&src(0), 100).unwrap().is_empty());
    }

    #[test]
    fn test_plan_zero_chunk_size() {
        assert!(matches!(
            plan(&src(10), 0),
            Err(PipelineError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_plan_covers_every_byte_once() {
        for total in [1u64, 2, 7, 99, 100, 101, 1000, 4097] {
            for chunk in [1u64, 3, 64, 100, 4096, 10_000] {
                let d = plan(&src(total), chunk).unwrap();
                assert_eq!(d.len() as u64, total.div_ceil(chunk), "total={total} chunk={chunk}");
                let mut next = 0u64;
                for (i, c) in d.iter().enumerate() {
                    assert_eq!(c.chunk_number as usize, i);
                    assert_eq!(c.start_byte, next, "gap/overlap at chunk {i}");
                    assert!(c.end_byte >= c.start_byte);
                    assert!(c.size() <= chunk);
                    next = c.end_byte + 1;
                }
                assert_eq!(next, total);
            }
        }
    }

    #[test]
    fn test_plan_is_deterministic() {
        assert_eq!(plan(&src(12345), 1000).unwrap(), plan(&src(12345), 1000).unwrap());
    }

    #[test]
    fn test_splitter_uses_head() {
        let store = Arc::new(MemStore::new());
        let obj = ObjectRef::new("b", "uploads/x.json");
        store.put(&obj, &[b' '; 25]).unwrap();
        let (source, d) = Splitter::new(store, 10).split(&obj).unwrap();
        assert_eq!(source.size, 25);
        assert_eq!(d.len(), 3);
        assert_eq!(d[2].byte_range().len(), 5);
    }

    #[test]
    fn test_splitter_missing_object() {
        let store = Arc::new(MemStore::new());
        let err = Splitter::new(store, 10)
            .split(&ObjectRef::new("b", "uploads/none.json"))
            .unwrap_err();
        assert!(matches!(err, PipelineError::Store(_)));
    }
}
