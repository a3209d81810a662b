//! Filesystem-backed object store: one directory per bucket under a root.

use crate::error::MlError;
use crate::store::ObjectStore;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Object store that keeps `bucket/key` at `<root>/<bucket>/<key>`.
///
/// Writes go through [`forest_core::persistence::atomic_write`], so an
/// overwrite is observed either whole or not at all.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, op: &'static str, bucket: &str, key: &str) -> Result<PathBuf, MlError> {
        check_segment(op, bucket, key, bucket)?;
        let key_path = Path::new(key);
        if key.is_empty()
            || key.ends_with('/')
            || !key_path
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(MlError::store(op, bucket, key, "invalid object key"));
        }
        Ok(self.root.join(bucket).join(key_path))
    }
}

fn check_segment(op: &'static str, bucket: &str, key: &str, segment: &str) -> Result<(), MlError> {
    let mut components = Path::new(segment).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(MlError::store(op, bucket, key, "invalid bucket name")),
    }
}

impl ObjectStore for FsObjectStore {
    fn exists(&self, bucket: &str, key: &str) -> Result<bool, MlError> {
        let path = self.object_path("exists", bucket, key)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(MlError::store("exists", bucket, key, e.to_string())),
        }
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, MlError> {
        let path = self.object_path("get", bucket, key)?;
        std::fs::read(&path).map_err(|e| MlError::store("get", bucket, key, e.to_string()))
    }

    fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<(), MlError> {
        let path = self.object_path("put", bucket, key)?;
        forest_core::persistence::atomic_write(&path, data)
            .map_err(|e| MlError::store("put", bucket, key, e.to_string()))
    }

    fn delete(&self, bucket: &str, key: &str) -> Result<(), MlError> {
        let path = self.object_path("delete", bucket, key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MlError::store("delete", bucket, key, e.to_string())),
        }
    }
}
