//! Prediction orchestrator: fetch input data, predict with the deployed model,
//! and upload the labelled output.

use crate::data::frame::{Column, ColumnData, DataFrame};
use crate::error::{MlError, Stage, StageExt};
use crate::model::remote::RemoteModelStore;
use crate::store::StorageService;
use forest_core::ForestConfig;
use forest_core::config::PredictionConfig;

pub struct PredictionPipeline {
    config: PredictionConfig,
    target_column: String,
    storage: StorageService,
    model: RemoteModelStore,
}

impl PredictionPipeline {
    pub fn new(config: &ForestConfig, storage: StorageService) -> Self {
        let model = RemoteModelStore::new(storage.clone(), &config.model.bucket, &config.model.key);
        Self {
            config: config.prediction.clone(),
            target_column: config.model.target_column.clone(),
            storage,
            model,
        }
    }

    pub fn model_store(&self) -> &RemoteModelStore {
        &self.model
    }

    /// Key the output is written to inside the data bucket.
    pub fn output_key(&self) -> String {
        self.config.output_key()
    }

    pub fn get_data(&self) -> Result<DataFrame, MlError> {
        let frame = self
            .storage
            .read_csv(&self.config.data_bucket, &self.config.data_key)?;
        tracing::info!(
            bucket = %self.config.data_bucket,
            key = %self.config.data_key,
            rows = frame.row_count(),
            "prediction data retrieved"
        );
        Ok(frame)
    }

    fn ensure_model_present(&self) -> Result<(), MlError> {
        if self.model.is_model_present() {
            Ok(())
        } else {
            Err(MlError::ModelNotFound {
                bucket: self.model.bucket().to_string(),
                key: self.model.key().to_string(),
            })
        }
    }

    /// Predict one label per row. Fails with `ModelNotFound` before any load
    /// attempt when no model is deployed.
    pub fn predict(&self, frame: &DataFrame) -> Result<Vec<String>, MlError> {
        self.ensure_model_present()?;
        self.model.predict(frame)
    }

    /// Replace any existing target column with `predictions`.
    fn attach_predictions(
        &self,
        mut frame: DataFrame,
        predictions: Vec<String>,
    ) -> Result<DataFrame, MlError> {
        if frame.drop_column(&self.target_column).is_some() {
            tracing::debug!(column = %self.target_column, "replacing existing target column");
        }
        frame.append_column(Column::new(
            self.target_column.clone(),
            ColumnData::infer(predictions),
        ))?;
        Ok(frame)
    }

    /// Run the full prediction flow and return the uploaded frame.
    ///
    /// The upload is the last step, so a failure anywhere earlier leaves no
    /// output object behind.
    pub fn initiate_prediction(&self) -> Result<DataFrame, MlError> {
        let frame = self.get_data().in_stage(Stage::DataRetrieval)?;
        self.ensure_model_present().in_stage(Stage::ModelCheck)?;
        let predictions = self.model.predict(&frame).in_stage(Stage::Prediction)?;
        let output = self
            .attach_predictions(frame, predictions)
            .in_stage(Stage::Prediction)?;

        let key = self.output_key();
        self.storage
            .upload_df_as_csv(&output, &self.config.data_bucket, &key)
            .in_stage(Stage::Upload)?;
        tracing::info!(
            bucket = %self.config.data_bucket,
            key = %key,
            rows = output.row_count(),
            "predictions uploaded"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::io;
    use crate::model::estimator::ForestModel;
    use crate::store::MemoryObjectStore;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn input() -> DataFrame {
        DataFrame::new(vec![
            Column::numeric("Elevation", vec![105.0, 905.0]),
            Column::numeric("Cover_Type", vec![9.0, 9.0]),
        ])
        .unwrap()
    }

    fn deploy(storage: &StorageService, config: &ForestConfig) {
        let train = DataFrame::new(vec![
            Column::numeric("Elevation", vec![100.0, 110.0, 900.0, 910.0]),
            Column::numeric("Cover_Type", vec![1.0, 1.0, 2.0, 2.0]),
        ])
        .unwrap();
        let bytes = ForestModel::fit(&train, &["Elevation".to_string()], "Cover_Type")
            .unwrap()
            .to_bytes()
            .unwrap();
        storage
            .put_object(&config.model.bucket, &config.model.key, &bytes)
            .unwrap();
    }

    fn setup() -> (ForestConfig, StorageService) {
        let config = ForestConfig::default();
        let storage = StorageService::new(Arc::new(MemoryObjectStore::new()));
        storage
            .upload_df_as_csv(&input(), &config.prediction.data_bucket, &config.prediction.data_key)
            .unwrap();
        (config, storage)
    }

    #[test]
    fn test_missing_model_fails_before_load() {
        let (config, storage) = setup();
        let pipeline = PredictionPipeline::new(&config, storage.clone());

        let err = pipeline.initiate_prediction().unwrap_err();
        assert_eq!(err.stage(), Some(Stage::ModelCheck));
        assert!(err.is_model_not_found());
        assert!(pipeline.model_store().loaded_model().is_none());
        assert!(
            !storage
                .key_available(&config.prediction.data_bucket, "predictions/predicted.csv")
                .unwrap()
        );
    }

    #[test]
    fn test_missing_input_fails_in_retrieval() {
        let config = ForestConfig::default();
        let storage = StorageService::new(Arc::new(MemoryObjectStore::new()));
        let err = PredictionPipeline::new(&config, storage)
            .initiate_prediction()
            .unwrap_err();
        assert_eq!(err.stage(), Some(Stage::DataRetrieval));
    }

    #[test]
    fn test_predictions_replace_target_and_upload() {
        let (config, storage) = setup();
        deploy(&storage, &config);
        let pipeline = PredictionPipeline::new(&config, storage.clone());

        let output = pipeline.initiate_prediction().unwrap();
        assert_eq!(output.column_names(), vec!["Elevation", "Cover_Type"]);
        assert_eq!(output.numeric("Cover_Type").unwrap(), &[1.0, 2.0]);

        let uploaded = storage
            .read_object(&config.prediction.data_bucket, &pipeline.output_key())
            .unwrap();
        assert_eq!(io::from_csv_bytes(&uploaded).unwrap(), output);
    }

    #[test]
    fn test_header_only_input_yields_empty_output() {
        let (config, storage) = setup();
        deploy(&storage, &config);
        storage
            .put_object(&config.prediction.data_bucket, &config.prediction.data_key, b"Elevation\n")
            .unwrap();
        let pipeline = PredictionPipeline::new(&config, storage.clone());

        let output = pipeline.initiate_prediction().unwrap();
        assert_eq!(output.row_count(), 0);
        assert_eq!(output.column_names(), vec!["Elevation", "Cover_Type"]);

        let uploaded = storage
            .read_object(&config.prediction.data_bucket, &pipeline.output_key())
            .unwrap();
        assert_eq!(uploaded, b"Elevation,Cover_Type\n".to_vec());
    }

    #[test]
    fn test_predict_requires_deployed_model() {
        let (config, storage) = setup();
        let pipeline = PredictionPipeline::new(&config, storage);
        let err = pipeline.predict(&input()).unwrap_err();
        assert!(matches!(err, MlError::ModelNotFound { .. }));
    }
}
