//! Model evaluation stage: compare the trained model with the deployed one.

use crate::data::io;
use crate::error::MlError;
use crate::model::estimator::{Estimator, accuracy};
use crate::model::remote::RemoteModelStore;
use crate::pipeline::artifact::{DataIngestionArtifact, ModelEvaluationArtifact, ModelTrainerArtifact};
use forest_core::config::EvaluationConfig;

pub struct ModelEvaluation {
    changed_threshold: f64,
    target_column: String,
    remote: RemoteModelStore,
}

impl ModelEvaluation {
    pub fn new(config: &EvaluationConfig, target_column: &str, remote: RemoteModelStore) -> Self {
        Self {
            changed_threshold: config.changed_threshold,
            target_column: target_column.to_string(),
            remote,
        }
    }

    /// Accept the trained model when nothing is deployed, or when it beats the
    /// deployed model on the test split by more than `changed_threshold`.
    pub fn initiate_model_evaluation(
        &self,
        ingestion: &DataIngestionArtifact,
        trainer: &ModelTrainerArtifact,
    ) -> Result<ModelEvaluationArtifact, MlError> {
        let trained_accuracy = trainer.metric.accuracy;

        if !self.remote.is_model_present() {
            tracing::info!("no deployed model, accepting trained model");
            return Ok(ModelEvaluationArtifact {
                is_model_accepted: true,
                changed_accuracy: trained_accuracy,
                remote_accuracy: None,
                trained_model_path: trainer.trained_model_file_path.clone(),
                remote_model_key: self.remote.key().to_string(),
            });
        }

        let test = io::read_csv(&ingestion.test_file_path)?;
        let actual = test
            .column(&self.target_column)
            .ok_or_else(|| {
                MlError::dataset(format!(
                    "target column '{}' is missing from the test split",
                    self.target_column
                ))
            })?
            .data
            .to_strings();
        let deployed = self.remote.load_model()?;
        let remote_accuracy = accuracy(&deployed.predict(&test)?, &actual);

        let changed_accuracy = trained_accuracy - remote_accuracy;
        let is_model_accepted = changed_accuracy > self.changed_threshold;
        tracing::info!(
            trained_accuracy,
            remote_accuracy,
            changed_accuracy,
            accepted = is_model_accepted,
            "model evaluated"
        );

        Ok(ModelEvaluationArtifact {
            is_model_accepted,
            changed_accuracy,
            remote_accuracy: Some(remote_accuracy),
            trained_model_path: trainer.trained_model_file_path.clone(),
            remote_model_key: self.remote.key().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::frame::{Column, DataFrame};
    use crate::model::estimator::ForestModel;
    use crate::pipeline::artifact::ClassificationMetric;
    use crate::store::{MemoryObjectStore, StorageService};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        storage: StorageService,
        ingestion: DataIngestionArtifact,
        trainer: ModelTrainerArtifact,
    }

    fn fixture(trained_accuracy: f64) -> Fixture {
        let dir = TempDir::new().unwrap();
        let frame = DataFrame::new(vec![
            Column::numeric("Elevation", vec![100.0, 900.0]),
            Column::numeric("Cover_Type", vec![1.0, 2.0]),
        ])
        .unwrap();
        let ingestion = DataIngestionArtifact {
            feature_store_file_path: dir.path().join("covtype.csv"),
            trained_file_path: dir.path().join("train.csv"),
            test_file_path: dir.path().join("test.csv"),
        };
        io::write_csv(&frame, &ingestion.test_file_path).unwrap();

        let model_path = dir.path().join("model.json");
        ForestModel::fit(&frame, &["Elevation".to_string()], "Cover_Type")
            .unwrap()
            .save(&model_path)
            .unwrap();
        let trainer = ModelTrainerArtifact {
            trained_model_file_path: model_path,
            train_metric: ClassificationMetric { accuracy: 1.0 },
            metric: ClassificationMetric {
                accuracy: trained_accuracy,
            },
        };
        Fixture {
            _dir: dir,
            storage: StorageService::new(Arc::new(MemoryObjectStore::new())),
            ingestion,
            trainer,
        }
    }

    fn evaluation(storage: &StorageService) -> ModelEvaluation {
        ModelEvaluation::new(
            &EvaluationConfig::default(),
            "Cover_Type",
            RemoteModelStore::new(storage.clone(), "forest-model", "model.json"),
        )
    }

    #[test]
    fn test_accepts_when_nothing_deployed() {
        let fx = fixture(0.7);
        let artifact = evaluation(&fx.storage)
            .initiate_model_evaluation(&fx.ingestion, &fx.trainer)
            .unwrap();
        assert!(artifact.is_model_accepted);
        assert_eq!(artifact.remote_accuracy, None);
        assert_eq!(artifact.remote_model_key, "model.json");
    }

    #[test]
    fn test_rejects_without_sufficient_gain() {
        let fx = fixture(1.0);
        fx.storage
            .upload_file(&fx.trainer.trained_model_file_path, "forest-model", "model.json", false)
            .unwrap();

        let artifact = evaluation(&fx.storage)
            .initiate_model_evaluation(&fx.ingestion, &fx.trainer)
            .unwrap();
        assert_eq!(artifact.remote_accuracy, Some(1.0));
        assert_eq!(artifact.changed_accuracy, 0.0);
        assert!(!artifact.is_model_accepted);
    }

    #[test]
    fn test_accepts_clear_improvement() {
        let fx = fixture(1.0);
        // A deployed model that inverts the labels scores zero.
        let inverted = DataFrame::new(vec![
            Column::numeric("Elevation", vec![100.0, 900.0]),
            Column::numeric("Cover_Type", vec![2.0, 1.0]),
        ])
        .unwrap();
        let bytes = ForestModel::fit(&inverted, &["Elevation".to_string()], "Cover_Type")
            .unwrap()
            .to_bytes()
            .unwrap();
        fx.storage
            .put_object("forest-model", "model.json", &bytes)
            .unwrap();

        let artifact = evaluation(&fx.storage)
            .initiate_model_evaluation(&fx.ingestion, &fx.trainer)
            .unwrap();
        assert_eq!(artifact.remote_accuracy, Some(0.0));
        assert!(artifact.is_model_accepted);
    }
}
