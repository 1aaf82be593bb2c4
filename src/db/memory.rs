use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

use super::{Bucket, KvStore, StoreError, WriteOp};

/// In-process [`KvStore`] used by tests and throwaway instances
///
/// A single mutex serializes every operation.
#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<Bucket, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let buckets = self.buckets.lock();
        Ok(buckets.get(&bucket).and_then(|b| b.get(key)).cloned())
    }

    fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.buckets
            .lock()
            .entry(bucket)
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: Bucket, key: &str) -> Result<(), StoreError> {
        if let Some(entries) = self.buckets.lock().get_mut(&bucket) {
            entries.remove(key);
        }
        Ok(())
    }

    fn delete_many(&self, bucket: Bucket, keys: &[String]) -> Result<(), StoreError> {
        if let Some(entries) = self.buckets.lock().get_mut(&bucket) {
            for key in keys {
                entries.remove(key);
            }
        }
        Ok(())
    }

    fn update(
        &self,
        bucket: Bucket,
        key: &str,
        f: &mut dyn FnMut(Option<&[u8]>) -> WriteOp,
    ) -> Result<(), StoreError> {
        let mut buckets = self.buckets.lock();
        let entries = buckets.entry(bucket).or_default();

        match f(entries.get(key).map(|v| v.as_slice())) {
            WriteOp::Put(bytes) => {
                entries.insert(key.to_string(), bytes);
            }
            WriteOp::Delete => {
                entries.remove(key);
            }
            WriteOp::Keep => {}
        }
        Ok(())
    }

    fn scan_prefix(
        &self,
        bucket: Bucket,
        prefix: &str,
    ) -> Result<Vec<(String, Vec<u8>)>, StoreError> {
        let buckets = self.buckets.lock();
        let Some(entries) = buckets.get(&bucket) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
