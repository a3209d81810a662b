//! Remote model store: presence check, load, save, and lazily cached prediction
//! for the single model kept at `bucket/key`.

use crate::data::frame::DataFrame;
use crate::error::MlError;
use crate::model::estimator::{Estimator, ForestModel};
use crate::store::StorageService;
use once_cell::sync::OnceCell;
use serde::de::DeserializeOwned;
use std::path::Path;

/// Handle on one remotely stored model.
///
/// The in-memory model is loaded at most once per handle and never
/// invalidated; a model replaced remotely is only seen by a new handle.
pub struct RemoteModelStore<M = ForestModel> {
    storage: StorageService,
    bucket: String,
    key: String,
    loaded_model: OnceCell<M>,
}

impl<M> RemoteModelStore<M>
where
    M: Estimator + DeserializeOwned,
{
    pub fn new(storage: StorageService, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            key: key.into(),
            loaded_model: OnceCell::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether a model object exists at `bucket/key`.
    ///
    /// Store failures are logged and reported as absent.
    pub fn is_model_present(&self) -> bool {
        match self.storage.key_available(&self.bucket, &self.key) {
            Ok(present) => present,
            Err(e) => {
                tracing::warn!(
                    bucket = %self.bucket,
                    key = %self.key,
                    error = %e,
                    "model presence check failed, treating model as absent"
                );
                false
            }
        }
    }

    /// Fetch and deserialize the remote model, bypassing the cache.
    pub fn load_model(&self) -> Result<M, MlError> {
        if !self.storage.key_available(&self.bucket, &self.key)? {
            return Err(MlError::ModelNotFound {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
            });
        }
        let bytes = self.storage.read_object(&self.bucket, &self.key)?;
        let model = serde_json::from_slice(&bytes).map_err(|e| {
            MlError::model(format!(
                "failed to deserialize model at {}/{}: {e}",
                self.bucket, self.key
            ))
        })?;
        tracing::info!(bucket = %self.bucket, key = %self.key, "model loaded");
        Ok(model)
    }

    /// Upload a local model file, replacing any model already at `bucket/key`.
    pub fn save_model(&self, from_file: &Path, remove: bool) -> Result<(), MlError> {
        self.storage
            .upload_file(from_file, &self.bucket, &self.key, remove)
    }

    /// Upload serialized model bytes, replacing any model already at `bucket/key`.
    pub fn save_model_bytes(&self, bytes: &[u8]) -> Result<(), MlError> {
        self.storage.put_object(&self.bucket, &self.key, bytes)
    }

    /// The cached model, if a prediction already loaded it.
    pub fn loaded_model(&self) -> Option<&M> {
        self.loaded_model.get()
    }

    /// Predict with the cached model, loading it on first use.
    pub fn predict(&self, frame: &DataFrame) -> Result<Vec<String>, MlError> {
        let model = self.loaded_model.get_or_try_init(|| self.load_model())?;
        model.predict(frame)
    }
}
