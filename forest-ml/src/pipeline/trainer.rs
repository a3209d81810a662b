//! Model trainer stage.

use crate::data::io;
use crate::error::MlError;
use crate::model::estimator::ForestModel;
use crate::pipeline::artifact::{ClassificationMetric, DataIngestionArtifact, ModelTrainerArtifact};
use forest_core::config::TrainerConfig;
use std::path::PathBuf;

pub struct ModelTrainer {
    feature_columns: Vec<String>,
    target_column: String,
    expected_accuracy: f64,
    model_path: PathBuf,
}

impl ModelTrainer {
    /// `feature_columns` should not contain `target_column`; it is filtered
    /// out if present.
    pub fn new(
        config: &TrainerConfig,
        feature_columns: &[String],
        target_column: &str,
        model_path: PathBuf,
    ) -> Self {
        Self {
            feature_columns: feature_columns
                .iter()
                .filter(|c| c.as_str() != target_column)
                .cloned()
                .collect(),
            target_column: target_column.to_string(),
            expected_accuracy: config.expected_accuracy,
            model_path,
        }
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn initiate_model_trainer(
        &self,
        ingestion: &DataIngestionArtifact,
    ) -> Result<ModelTrainerArtifact, MlError> {
        tracing::info!(
            features = self.feature_columns.len(),
            target = %self.target_column,
            "starting model trainer"
        );
        let train = io::read_csv(&ingestion.trained_file_path)?;
        let test = io::read_csv(&ingestion.test_file_path)?;

        let model = ForestModel::fit(&train, &self.feature_columns, &self.target_column)?;
        let train_accuracy = model.score(&train)?;
        let test_accuracy = model.score(&test)?;
        tracing::info!(train_accuracy, test_accuracy, "model fitted");

        if test_accuracy < self.expected_accuracy {
            return Err(MlError::training(format!(
                "test accuracy {test_accuracy:.4} is below the expected {:.4}",
                self.expected_accuracy
            )));
        }

        model.save(&self.model_path)?;
        tracing::info!(path = %self.model_path.display(), "trained model saved");
        Ok(ModelTrainerArtifact {
            trained_model_file_path: self.model_path.clone(),
            train_metric: ClassificationMetric {
                accuracy: train_accuracy,
            },
            metric: ClassificationMetric {
                accuracy: test_accuracy,
            },
        })
    }
}
