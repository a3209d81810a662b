//! In-process object store.

use crate::error::MlError;
use crate::store::ObjectStore;
use std::collections::HashMap;
use std::sync::Mutex;

/// Object store backed by a `HashMap`; contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(
        &self,
        op: &'static str,
        bucket: &str,
        key: &str,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<(String, String), Vec<u8>>>, MlError> {
        self.objects
            .lock()
            .map_err(|_| MlError::store(op, bucket, key, "store lock poisoned"))
    }
}

impl ObjectStore for MemoryObjectStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, MlError> {
        let objects = self.lock("exists", bucket, key)?;
        Ok(objects.contains_key(&(bucket.to_string(), key.to_string())))
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MlError> {
        let objects = self.lock("get", bucket, key)?;
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| MlError::store("get", bucket, key, "no such object"))
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), MlError> {
        let mut objects = self.lock("put", bucket, key)?;
        objects.insert((bucket.to_string(), key.to_string()), data.to_vec());
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), MlError> {
        let mut objects = self.lock("delete", bucket, key)?;
        objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
