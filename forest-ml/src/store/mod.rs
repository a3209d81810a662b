//! Object store abstraction: bytes addressed by `(bucket, key)`.
//!
//! [`ObjectStore`] is the raw I/O seam; [`StorageService`] layers the
//! operations the pipelines need (file upload, CSV read/write) on top of it.

pub mod fs;
pub mod memory;

pub use fs::FsObjectStore;
pub use memory::MemoryObjectStore;

use crate::data::frame::DataFrame;
use crate::data::io;
use crate::error::MlError;
use std::path::Path;
use std::sync::Arc;

/// Raw bucket/key persistence.
///
/// `exists` reports a missing object as `Ok(false)`; only transport or
/// permission failures are errors. `put` replaces any previous object without
/// exposing a partially written one.
pub trait ObjectStore: Send + Sync {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, MlError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MlError>;

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), MlError>;

    fn delete(&self, bucket: &str, key: &str) -> Result<(), MlError>;
}

/// High-level storage operations over an [`ObjectStore`].
#[derive(Clone)]
pub struct StorageService {
    store: Arc<dyn ObjectStore>,
}

impl StorageService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    pub fn key_available(&self, bucket: &str, key: &str) -> Result<bool, MlError> {
        self.store.exists(bucket, key)
    }

    pub fn read_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MlError> {
        self.store.get(bucket, key)
    }

    pub fn put_object(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), MlError> {
        self.store.put(bucket, key, data)
    }

    /// Upload a local file to `bucket/key`, optionally deleting the local copy
    /// once the upload succeeded.
    pub fn upload_file(
        &self,
        from: &Path,
        bucket: &str,
        key: &str,
        remove: bool,
    ) -> Result<(), MlError> {
        let data = std::fs::read(from)?;
        self.store.put(bucket, key, &data)?;
        tracing::info!(
            from = %from.display(),
            bucket,
            key,
            bytes = data.len(),
            "uploaded file"
        );
        if remove {
            std::fs::remove_file(from)?;
            tracing::debug!(path = %from.display(), "removed local copy");
        }
        Ok(())
    }

    pub fn read_csv(&self, bucket: &str, key: &str) -> Result<DataFrame, MlError> {
        let bytes = self.store.get(bucket, key)?;
        io::from_csv_bytes(&bytes)
    }

    pub fn upload_df_as_csv(
        &self,
        frame: &DataFrame,
        bucket: &str,
        key: &str,
    ) -> Result<(), MlError> {
        let bytes = io::to_csv_bytes(frame)?;
        self.store.put(bucket, key, &bytes)
    }
}
