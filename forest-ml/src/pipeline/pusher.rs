//! Model pusher stage: publish an accepted model to the remote store.

use crate::error::MlError;
use crate::model::remote::RemoteModelStore;
use crate::pipeline::artifact::{ModelEvaluationArtifact, ModelPusherArtifact};
use sha2::{Digest, Sha256};

pub struct ModelPusher {
    remote: RemoteModelStore,
}

impl ModelPusher {
    pub fn new(remote: RemoteModelStore) -> Self {
        Self { remote }
    }

    /// Upload the evaluated model, keeping the local copy.
    ///
    /// The recorded digest is of the exact bytes uploaded.
    pub fn initiate_model_pusher(
        &self,
        evaluation: &ModelEvaluationArtifact,
    ) -> Result<ModelPusherArtifact, MlError> {
        let path = &evaluation.trained_model_path;
        let bytes = std::fs::read(path)?;
        let sha256 = format!("{:x}", Sha256::digest(&bytes));

        self.remote.save_model_bytes(&bytes)?;
        tracing::info!(
            bucket = %self.remote.bucket(),
            key = %self.remote.key(),
            %sha256,
            "model pushed"
        );
        Ok(ModelPusherArtifact {
            bucket: self.remote.bucket().to_string(),
            key: self.remote.key().to_string(),
            sha256,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, StorageService};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_push_records_digest_and_keeps_local_copy() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, b"{}").unwrap();
        let storage = StorageService::new(Arc::new(MemoryObjectStore::new()));
        let pusher = ModelPusher::new(RemoteModelStore::new(
            storage.clone(),
            "forest-model",
            "model.json",
        ));
        let evaluation = ModelEvaluationArtifact {
            is_model_accepted: true,
            changed_accuracy: 1.0,
            remote_accuracy: None,
            trained_model_path: path.clone(),
            remote_model_key: "model.json".into(),
        };

        let artifact = pusher.initiate_model_pusher(&evaluation).unwrap();
        assert_eq!(
            artifact.sha256,
            "44136fa355b3678a1146ad16f7e8649e94fb4fc21fe77e8310c060f61caaff8a"
        );
        let pushed = storage.read_object("forest-model", "model.json").unwrap();
        assert_eq!(pushed, b"{}");
        assert_eq!(format!("{:x}", Sha256::digest(&pushed)), artifact.sha256);
        assert!(path.exists());
    }

    #[test]
    fn test_missing_local_model_uploads_nothing() {
        let dir = TempDir::new().unwrap();
        let storage = StorageService::new(Arc::new(MemoryObjectStore::new()));
        let pusher = ModelPusher::new(RemoteModelStore::new(
            storage.clone(),
            "forest-model",
            "model.json",
        ));
        let evaluation = ModelEvaluationArtifact {
            is_model_accepted: true,
            changed_accuracy: 1.0,
            remote_accuracy: None,
            trained_model_path: dir.path().join("missing.json"),
            remote_model_key: "model.json".into(),
        };

        assert!(matches!(
            pusher.initiate_model_pusher(&evaluation),
            Err(MlError::Io(_))
        ));
        assert!(!storage.key_available("forest-model", "model.json").unwrap());
    }
}
