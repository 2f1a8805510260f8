use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use super::{BlobStore, StoreError, StoreResult, check_range};
use crate::domain::ObjectRef;

/// Which operations on a key should fail, and how many more times.
#[derive(Clone, Copy, Debug, Default)]
struct Faults {
    reads: u32,
    writes: u32,
}

/// In-memory blob store. Also used to simulate flaky storage in tests and dry runs.
#[derive(Default)]
pub struct MemStore {
    objects: Mutex<BTreeMap<ObjectRef, Vec<u8>>>,
    faults: Mutex<HashMap<ObjectRef, Faults>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `times` reads (get/get_range) of `obj` fail with an I/O error.
    pub fn fail_reads(&self, obj: &ObjectRef, times: u32) {
        self.with_faults(|f| f.entry(obj.clone()).or_default().reads = times);
    }

    /// The next `times` puts of `obj` fail with an I/O error.
    pub fn fail_writes(&self, obj: &ObjectRef, times: u32) {
        self.with_faults(|f| f.entry(obj.clone()).or_default().writes = times);
    }

    pub fn len(&self) -> usize {
        self.lock_objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<ObjectRef, Vec<u8>>> {
        // every critical section leaves the map consistent, so poison is ignored
        self.objects.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn with_faults<T>(&self, f: impl FnOnce(&mut HashMap<ObjectRef, Faults>) -> T) -> T {
        let mut g = self.faults.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut g)
    }

    fn trip(&self, obj: &ObjectRef, write: bool) -> StoreResult<()> {
        let tripped = self.with_faults(|faults| {
            let Some(f) = faults.get_mut(obj) else {
                return false;
            };
            let counter = if write { &mut f.writes } else { &mut f.reads };
            if *counter == 0 {
                return false;
            }
            *counter -= 1;
            true
        });
        if tripped {
            let op = if write { "write" } else { "read" };
            return Err(StoreError::Io(std::io::Error::other(format!(
                "injected {op} fault on {obj}"
            ))));
        }
        Ok(())
    }
}

impl BlobStore for MemStore {
    fn head(&self, obj: &ObjectRef) -> StoreResult<u64> {
        self.lock_objects()
            .get(obj)
            .map(|v| v.len() as u64)
            .ok_or_else(|| StoreError::NotFound(obj.clone()))
    }

    fn get_range(&self, obj: &ObjectRef, start: u64, end: u64) -> StoreResult<Vec<u8>> {
        self.trip(obj, false)?;
        let objects = self.lock_objects();
        let data = objects
            .get(obj)
            .ok_or_else(|| StoreError::NotFound(obj.clone()))?;
        check_range(obj, start, end, data.len() as u64)?;
        Ok(data[start as usize..=end as usize].to_vec())
    }

    fn get(&self, obj: &ObjectRef) -> StoreResult<Vec<u8>> {
        self.trip(obj, false)?;
        self.lock_objects()
            .get(obj)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(obj.clone()))
    }

    fn put(&self, obj: &ObjectRef, data: &[u8]) -> StoreResult<()> {
        self.trip(obj, true)?;
        self.lock_objects().insert(obj.clone(), data.to_vec());
        Ok(())
    }

    fn delete(&self, obj: &ObjectRef) -> StoreResult<()> {
        self.lock_objects()
            .remove(obj)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(obj.clone()))
    }

    fn list(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .lock_objects()
            .keys()
            .filter(|o| o.bucket == bucket && o.key.starts_with(prefix))
            .map(|o| o.key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injected_read_faults_run_out() {
        let s = MemStore::new();
        let obj = ObjectRef::new("b", "k");
        s.put(&obj, b"hello").unwrap();
        s.fail_reads(&obj, 2);
        assert!(s.get(&obj).is_err());
        assert!(s.get_range(&obj, 0, 1).is_err());
        assert_eq!(s.get_range(&obj, 0, 1).unwrap(), b"he");
    }

    #[test]
    fn test_injected_write_fault() {
        let s = MemStore::new();
        let obj = ObjectRef::new("b", "k");
        s.fail_writes(&obj, 1);
        assert!(s.put(&obj, b"x").is_err());
        assert!(s.is_empty());
        s.put(&obj, b"x").unwrap();
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_list_is_scoped_to_bucket() {
        let s = MemStore::new();
        s.put(&ObjectRef::new("a", "processed/x"), b"1").unwrap();
        s.put(&ObjectRef::new("b", "processed/y"), b"2").unwrap();
        assert_eq!(s.list("a", "processed/").unwrap(), vec!["processed/x"]);
    }
}
