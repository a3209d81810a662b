//! Validation gate: schema conformance of the train/test splits, followed by
//! drift detection when the splits conform.

use crate::data::drift::DriftDetector;
use crate::data::frame::DataFrame;
use crate::data::io;
use crate::data::schema::SchemaSpec;
use crate::error::MlError;
use crate::pipeline::artifact::{DataIngestionArtifact, DataValidationArtifact};
use forest_core::config::ValidationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Verdict of the validation gate.
///
/// A schema mismatch is a `Failed` outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ValidationOutcome {
    Passed,
    Failed { reason: String },
}

impl ValidationOutcome {
    pub fn is_passed(&self) -> bool {
        matches!(self, ValidationOutcome::Passed)
    }

    pub fn reason(&self) -> &str {
        match self {
            ValidationOutcome::Passed => "",
            ValidationOutcome::Failed { reason } => reason,
        }
    }
}

/// Checks ingested splits against the schema.
pub struct DataValidation {
    schema: SchemaSpec,
    drift: DriftDetector,
    drift_report_file_path: PathBuf,
}

impl DataValidation {
    pub fn new(
        schema: SchemaSpec,
        config: &ValidationConfig,
        drift_report_file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            schema,
            drift: DriftDetector::new(config),
            drift_report_file_path: drift_report_file_path.into(),
        }
    }

    /// Load the schema at `schema_path` and build the gate.
    pub fn from_schema_file(
        schema_path: &Path,
        config: &ValidationConfig,
        drift_report_file_path: impl Into<PathBuf>,
    ) -> Result<Self, MlError> {
        let schema = SchemaSpec::load(schema_path)?;
        Ok(Self::new(schema, config, drift_report_file_path))
    }

    pub fn schema(&self) -> &SchemaSpec {
        &self.schema
    }

    pub fn validate_number_of_columns(&self, frame: &DataFrame) -> bool {
        let expected = self.schema.expected_column_count();
        let actual = frame.column_count();
        tracing::info!(expected, actual, "checking number of columns");
        actual == expected
    }

    /// Schema numerical columns absent from `frame`, in schema order.
    pub fn missing_numerical_columns(&self, frame: &DataFrame) -> Vec<String> {
        self.schema
            .numerical_columns
            .iter()
            .filter(|name| !frame.has_column(name))
            .cloned()
            .collect()
    }

    pub fn is_numerical_column_exist(&self, frame: &DataFrame) -> bool {
        let missing = self.missing_numerical_columns(frame);
        if missing.is_empty() {
            return true;
        }
        tracing::info!(?missing, "missing numerical columns");
        false
    }

    /// Run every schema check on both splits; on success, run drift detection.
    pub fn validate(
        &self,
        train: &DataFrame,
        test: &DataFrame,
    ) -> Result<DataValidationArtifact, MlError> {
        let mut message = String::new();

        if !self.validate_number_of_columns(train) {
            message.push_str("Columns are missing in train dataframe. ");
        }
        if !self.validate_number_of_columns(test) {
            message.push_str("Columns are missing in test dataframe. ");
        }
        if !self.is_numerical_column_exist(train) {
            message.push_str("Numerical columns are missing in train dataframe. ");
        }
        if !self.is_numerical_column_exist(test) {
            message.push_str("Numerical columns are missing in test dataframe. ");
        }

        if !message.is_empty() {
            tracing::info!(reason = %message.trim_end(), "data validation failed");
            return Ok(DataValidationArtifact {
                outcome: ValidationOutcome::Failed { reason: message },
                drift_report_file_path: self.drift_report_file_path.clone(),
                dataset_drift: None,
            });
        }

        let drifted =
            self.drift
                .detect_dataset_drift(train, test, &self.drift_report_file_path)?;
        if drifted {
            tracing::warn!(
                report = %self.drift_report_file_path.display(),
                "drift detected between train and test splits"
            );
        }

        Ok(DataValidationArtifact {
            outcome: ValidationOutcome::Passed,
            drift_report_file_path: self.drift_report_file_path.clone(),
            dataset_drift: Some(drifted),
        })
    }

    pub fn initiate_data_validation(
        &self,
        ingestion: &DataIngestionArtifact,
    ) -> Result<DataValidationArtifact, MlError> {
        tracing::info!("starting data validation");
        let train = io::read_csv(&ingestion.trained_file_path)?;
        let test = io::read_csv(&ingestion.test_file_path)?;
        let artifact = self.validate(&train, &test)?;
        tracing::info!(
            status = artifact.validation_status(),
            dataset_drift = ?artifact.dataset_drift,
            "data validation finished"
        );
        Ok(artifact)
    }
}
