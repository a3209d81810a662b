//! Data ingestion: export the raw dataset into the feature store and split it
//! into train and test sets.

use crate::data::frame::DataFrame;
use crate::data::io;
use crate::error::MlError;
use crate::pipeline::artifact::{ArtifactLayout, DataIngestionArtifact};
use forest_core::config::IngestionConfig;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::path::PathBuf;

pub struct DataIngestion {
    source_path: PathBuf,
    test_split_ratio: f64,
    seed: u64,
    feature_store_file: PathBuf,
    train_file: PathBuf,
    test_file: PathBuf,
}

impl DataIngestion {
    pub fn new(config: &IngestionConfig, layout: &ArtifactLayout) -> Self {
        Self {
            source_path: config.source_path.clone(),
            test_split_ratio: config.test_split_ratio,
            seed: config.seed,
            feature_store_file: layout.feature_store_file.clone(),
            train_file: layout.train_file.clone(),
            test_file: layout.test_file.clone(),
        }
    }

    /// Read the raw dataset and persist a copy in the feature store.
    pub fn export_data_into_feature_store(&self) -> Result<DataFrame, MlError> {
        if !self.source_path.is_file() {
            return Err(MlError::dataset(format!(
                "source dataset `{}` does not exist",
                self.source_path.display()
            )));
        }
        let frame = io::read_csv(&self.source_path)?;
        if frame.is_empty() {
            return Err(MlError::dataset(format!(
                "source dataset `{}` has no rows",
                self.source_path.display()
            )));
        }
        io::write_csv(&frame, &self.feature_store_file)?;
        tracing::info!(
            rows = frame.row_count(),
            columns = frame.column_count(),
            path = %self.feature_store_file.display(),
            "exported data into feature store"
        );
        Ok(frame)
    }

    /// Shuffle rows with the configured seed and hold out
    /// `ceil(rows * test_split_ratio)` of them as the test split.
    pub fn split_data_as_train_test(
        &self,
        frame: &DataFrame,
    ) -> Result<(DataFrame, DataFrame), MlError> {
        let ratio = self.test_split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(MlError::dataset(format!(
                "test split ratio must be within (0, 1), got {ratio}"
            )));
        }
        let rows = frame.row_count();
        let test_rows = (rows as f64 * ratio).ceil() as usize;
        if test_rows >= rows {
            return Err(MlError::dataset(format!(
                "{rows} row(s) cannot be split into non-empty train and test sets"
            )));
        }

        let mut indices: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);
        let (test_idx, train_idx) = indices.split_at(test_rows);

        let train = frame.take_rows(train_idx)?;
        let test = frame.take_rows(test_idx)?;
        io::write_csv(&train, &self.train_file)?;
        io::write_csv(&test, &self.test_file)?;
        tracing::info!(
            train_rows = train.row_count(),
            test_rows = test.row_count(),
            "split data into train and test sets"
        );
        Ok((train, test))
    }

    pub fn initiate_data_ingestion(&self) -> Result<DataIngestionArtifact, MlError> {
        tracing::info!(source = %self.source_path.display(), "starting data ingestion");
        let frame = self.export_data_into_feature_store()?;
        self.split_data_as_train_test(&frame)?;
        Ok(DataIngestionArtifact {
            feature_store_file_path: self.feature_store_file.clone(),
            trained_file_path: self.train_file.clone(),
            test_file_path: self.test_file.clone(),
        })
    }
}
