use super::BlobStore;
use super::StoreResult;
use super::fs::FsStore;
use super::mem::MemStore;
use std::path::PathBuf;
use std::sync::Arc;

pub enum Backend {
    Fs(PathBuf),
    Memory,
}

pub fn open_store(backend: Backend) -> StoreResult<Arc<dyn BlobStore>> {
    match backend {
        Backend::Fs(root) => Ok(Arc::new(FsStore::new(root)?)),
        Backend::Memory => Ok(Arc::new(MemStore::new())),
    }
}
