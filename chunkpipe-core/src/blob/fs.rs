use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use super::{BlobStore, StoreError, StoreResult, check_range};
use crate::domain::ObjectRef;

/// Blob store backed by a local directory: `<root>/<bucket>/<key>`.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, obj: &ObjectRef) -> StoreResult<PathBuf> {
        let bucket = safe_component(&obj.bucket)?;
        let key = safe_relative(&obj.key)?;
        Ok(self.root.join(bucket).join(key))
    }

    fn open(&self, obj: &ObjectRef) -> StoreResult<File> {
        let path = self.path_for(obj)?;
        File::open(&path).map_err(|e| not_found_or_io(obj, e))
    }
}

fn not_found_or_io(obj: &ObjectRef, e: std::io::Error) -> StoreError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(obj.clone())
    } else {
        StoreError::Io(e)
    }
}

fn safe_component(bucket: &str) -> StoreResult<&Path> {
    let p = Path::new(bucket);
    let mut comps = p.components();
    match (comps.next(), comps.next()) {
        (Some(Component::Normal(_)), None) => Ok(p),
        _ => Err(StoreError::InvalidKey(format!("bucket: {bucket}"))),
    }
}

fn safe_relative(key: &str) -> StoreResult<&Path> {
    let p = Path::new(key);
    if key.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(p)
}

impl BlobStore for FsStore {
    fn head(&self, obj: &ObjectRef) -> StoreResult<u64> {
        let path = self.path_for(obj)?;
        let md = fs::metadata(&path).map_err(|e| not_found_or_io(obj, e))?;
        if !md.is_file() {
            return Err(StoreError::NotFound(obj.clone()));
        }
        Ok(md.len())
    }

    fn get_range(&self, obj: &ObjectRef, start: u64, end: u64) -> StoreResult<Vec<u8>> {
        let mut f = self.open(obj)?;
        let size = f.metadata()?.len();
        check_range(obj, start, end, size)?;
        f.seek(SeekFrom::Start(start))?;
        let mut buf = vec![0u8; (end - start + 1) as usize];
        f.read_exact(&mut buf)?;
        debug!(object = %obj, start, end, "range read");
        Ok(buf)
    }

    fn get(&self, obj: &ObjectRef) -> StoreResult<Vec<u8>> {
        let mut f = self.open(obj)?;
        let mut buf = Vec::new();
        f.read_to_end(&mut buf)?;
        debug!(object = %obj, bytes = buf.len(), "get");
        Ok(buf)
    }

    fn put(&self, obj: &ObjectRef, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(obj)?;
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(obj.key.clone()))?;
        fs::create_dir_all(dir)?;
        // temp file in the target dir so the rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(object = %obj, bytes = data.len(), "put");
        Ok(())
    }

    fn delete(&self, obj: &ObjectRef) -> StoreResult<()> {
        let path = self.path_for(obj)?;
        fs::remove_file(&path).map_err(|e| not_found_or_io(obj, e))?;
        debug!(object = %obj, "delete");
        Ok(())
    }

    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let base = self.root.join(safe_component(bucket)?);
        if !base.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for e in WalkDir::new(&base).follow_links(false) {
            let e = e.map_err(|e| std::io::Error::other(e.to_string()))?;
            if !e.file_type().is_file() || e.file_name().to_string_lossy().starts_with(".tmp") {
                continue;
            }
            let Ok(rel) = e.path().strip_prefix(&base) else {
                continue;
            };
            // keys always use '/' regardless of platform
            let key = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
