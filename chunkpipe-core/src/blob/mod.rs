// chunkpipe_core/src/blob/mod.rs
use crate::domain::ObjectRef;
use thiserror::Error;

pub mod factory;
pub mod fs;
pub mod mem;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no such object: {0}")]
    NotFound(ObjectRef),

    #[error("range {start}-{end} not satisfiable for {object} (size {size})")]
    InvalidRange {
        object: ObjectRef,
        start: u64,
        end: u64,
        size: u64,
    },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Bucket/key object storage as the pipeline sees it.
///
/// Implementations are shared across worker threads; every method takes `&self`.
pub trait BlobStore: Send + Sync {
    /// Size of the object in bytes.
    fn head(&self, obj: &ObjectRef) -> StoreResult<u64>;

    /// Bytes `[start, end]` inclusive. Fails with `InvalidRange` when `end` is past the object.
    fn get_range(&self, obj: &ObjectRef, start: u64, end: u64) -> StoreResult<Vec<u8>>;

    fn get(&self, obj: &ObjectRef) -> StoreResult<Vec<u8>>;

    /// Create or overwrite.
    fn put(&self, obj: &ObjectRef, data: &[u8]) -> StoreResult<()>;

    fn delete(&self, obj: &ObjectRef) -> StoreResult<()>;

    /// Keys under `prefix` in `bucket`, sorted.
    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>>;
}

pub(crate) fn check_range(obj: &ObjectRef, start: u64, end: u64, size: u64) -> StoreResult<()> {
    if start > end || end >= size {
        return Err(StoreError::InvalidRange {
            object: obj.clone(),
            start,
            end,
            size,
        });
    }
    Ok(())
}
