//! Error types for the forest-ml crate.
//!
//! A schema mismatch is never an error here: the validation gate reports it as
//! a failed [`ValidationOutcome`](crate::data::validate::ValidationOutcome).
//! Everything below is an exceptional failure that aborts the current step.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum MlError {
    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Drift detection error: {0}")]
    Drift(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Model not found at {bucket}/{key}")]
    ModelNotFound { bucket: String, key: String },

    #[error("Object store {op} failed for {bucket}/{key}: {message}")]
    Store {
        op: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    #[error("Another pipeline run holds the lock at {}", path.display())]
    RunInProgress { path: PathBuf },

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<MlError>,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] forest_core::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl MlError {
    pub fn dataset(msg: impl Into<String>) -> Self {
        Self::Dataset(msg.into())
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    pub fn drift(msg: impl Into<String>) -> Self {
        Self::Drift(msg.into())
    }

    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    pub fn training(msg: impl Into<String>) -> Self {
        Self::Training(msg.into())
    }

    pub fn store(
        op: &'static str,
        bucket: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Store {
            op,
            bucket: bucket.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Wrap this error with the pipeline step it escaped from.
    pub fn in_stage(self, stage: Stage) -> Self {
        Self::Stage {
            stage,
            source: Box::new(self),
        }
    }

    /// The outermost stage this error was raised in, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error beneath any stage wrappers.
    pub fn root(&self) -> &MlError {
        let mut current = self;
        while let Self::Stage { source, .. } = current {
            current = source.as_ref();
        }
        current
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self.root(), Self::ModelNotFound { .. })
    }
}

/// Pipeline steps an error can be attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DataIngestion,
    DataValidation,
    ModelTrainer,
    ModelEvaluation,
    ModelPusher,
    DataRetrieval,
    ModelCheck,
    Prediction,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::DataIngestion => "data ingestion",
            Stage::DataValidation => "data validation",
            Stage::ModelTrainer => "model trainer",
            Stage::ModelEvaluation => "model evaluation",
            Stage::ModelPusher => "model pusher",
            Stage::DataRetrieval => "prediction data retrieval",
            Stage::ModelCheck => "model presence check",
            Stage::Prediction => "prediction",
            Stage::Upload => "prediction upload",
        };
        f.write_str(name)
    }
}

/// Attach a [`Stage`] to the error side of a result.
pub trait StageExt<T> {
    fn in_stage(self, stage: Stage) -> Result<T, MlError>;
}

impl<T, E: Into<MlError>> StageExt<T> for Result<T, E> {
    fn in_stage(self, stage: Stage) -> Result<T, MlError> {
        self.map_err(|e| e.into().in_stage(stage))
    }
}

pub type Result<T, E = MlError> = std::result::Result<T, E>;
