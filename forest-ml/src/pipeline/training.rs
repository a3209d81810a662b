//! Training orchestrator: ingestion, validation gate, trainer, evaluation and
//! pusher, run strictly in sequence.

use crate::data::ingest::DataIngestion;
use crate::data::validate::DataValidation;
use crate::error::{MlError, Stage, StageExt};
use crate::model::remote::RemoteModelStore;
use crate::pipeline::artifact::{
    ArtifactLayout, DataIngestionArtifact, DataValidationArtifact, ModelEvaluationArtifact,
    ModelPusherArtifact, ModelTrainerArtifact, RunLock,
};
use crate::pipeline::evaluation::ModelEvaluation;
use crate::pipeline::pusher::ModelPusher;
use crate::pipeline::trainer::ModelTrainer;
use crate::store::StorageService;
use forest_core::ForestConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a training run currently is, or how it ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingState {
    Idle,
    Ingesting,
    Validating,
    Training,
    Evaluating,
    Pushing,
    /// Every stage ran; the model was pushed or the evaluation kept the
    /// deployed one.
    Done,
    /// The validation gate rejected the data; no later stage ran.
    Halted,
    Failed,
}

impl TrainingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Halted | Self::Failed)
    }
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Ingesting => "ingesting",
            Self::Validating => "validating",
            Self::Training => "training",
            Self::Evaluating => "evaluating",
            Self::Pushing => "pushing",
            Self::Done => "done",
            Self::Halted => "halted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Artifacts of a finished (done or halted) run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub state: TrainingState,
    pub run_dir: PathBuf,
    pub data_ingestion: DataIngestionArtifact,
    pub data_validation: DataValidationArtifact,
    pub model_trainer: Option<ModelTrainerArtifact>,
    pub model_evaluation: Option<ModelEvaluationArtifact>,
    pub model_pusher: Option<ModelPusherArtifact>,
}

impl TrainingReport {
    pub fn is_halted(&self) -> bool {
        self.state == TrainingState::Halted
    }

    pub fn is_pushed(&self) -> bool {
        self.model_pusher.is_some()
    }
}

pub struct TrainPipeline {
    config: ForestConfig,
    storage: StorageService,
    state: TrainingState,
}

impl TrainPipeline {
    pub fn new(config: &ForestConfig, storage: StorageService) -> Self {
        Self {
            config: config.clone(),
            storage,
            state: TrainingState::Idle,
        }
    }

    pub fn state(&self) -> TrainingState {
        self.state
    }

    fn enter(&mut self, state: TrainingState) {
        tracing::info!(%state, "training pipeline state");
        self.state = state;
    }

    fn remote_model(&self) -> RemoteModelStore {
        RemoteModelStore::new(
            self.storage.clone(),
            &self.config.model.bucket,
            &self.config.model.key,
        )
    }

    /// Run every stage in order.
    ///
    /// A failed validation gate is not an error: the run stops in
    /// [`TrainingState::Halted`] and the report carries the reason. Any stage
    /// error stops the run in [`TrainingState::Failed`] and is returned wrapped
    /// in [`MlError::Stage`]. Artifacts written by earlier stages are left in
    /// place. A run lock held by another live run fails before any stage
    /// starts, with an unwrapped [`MlError::RunInProgress`].
    pub fn run_pipeline(&mut self) -> Result<TrainingReport, MlError> {
        let _lock = match RunLock::acquire(&self.config.artifacts.root_dir) {
            Ok(lock) => lock,
            Err(e) => {
                self.state = TrainingState::Failed;
                tracing::error!(error = %e, "training pipeline could not start");
                return Err(e);
            }
        };
        let layout = ArtifactLayout::new(&self.config);
        tracing::info!(run_dir = %layout.run_dir.display(), "training pipeline started");

        let result = self.run_stages(&layout);
        match &result {
            Ok(report) => {
                self.state = report.state;
                tracing::info!(state = %report.state, "training pipeline finished");
            }
            Err(e) => {
                self.state = TrainingState::Failed;
                tracing::error!(error = %e, "training pipeline failed");
            }
        }
        result
    }

    fn run_stages(&mut self, layout: &ArtifactLayout) -> Result<TrainingReport, MlError> {
        self.enter(TrainingState::Ingesting);
        let data_ingestion = DataIngestion::new(&self.config.ingestion, layout)
            .initiate_data_ingestion()
            .in_stage(Stage::DataIngestion)?;

        self.enter(TrainingState::Validating);
        let validation = DataValidation::from_schema_file(
            &self.config.schema.path,
            &self.config.validation,
            layout.drift_report_file.clone(),
        )
        .in_stage(Stage::DataValidation)?;
        let data_validation = validation
            .initiate_data_validation(&data_ingestion)
            .in_stage(Stage::DataValidation)?;

        let mut report = TrainingReport {
            state: TrainingState::Halted,
            run_dir: layout.run_dir.clone(),
            data_ingestion,
            data_validation,
            model_trainer: None,
            model_evaluation: None,
            model_pusher: None,
        };
        if !report.data_validation.validation_status() {
            tracing::warn!(
                reason = %report.data_validation.message().trim_end(),
                "validation gate rejected the data, halting"
            );
            return Ok(report);
        }

        self.enter(TrainingState::Training);
        let trainer = ModelTrainer::new(
            &self.config.trainer,
            &validation.schema().numerical_columns,
            &self.config.model.target_column,
            layout.trained_model_file.clone(),
        );
        let model_trainer = trainer
            .initiate_model_trainer(&report.data_ingestion)
            .in_stage(Stage::ModelTrainer)?;

        self.enter(TrainingState::Evaluating);
        let model_evaluation = ModelEvaluation::new(
            &self.config.evaluation,
            &self.config.model.target_column,
            self.remote_model(),
        )
        .initiate_model_evaluation(&report.data_ingestion, &model_trainer)
        .in_stage(Stage::ModelEvaluation)?;

        let model_pusher = if model_evaluation.is_model_accepted {
            self.enter(TrainingState::Pushing);
            let pushed = ModelPusher::new(self.remote_model())
                .initiate_model_pusher(&model_evaluation)
                .in_stage(Stage::ModelPusher)?;
            Some(pushed)
        } else {
            tracing::info!("trained model not accepted, keeping deployed model");
            None
        };

        report.state = TrainingState::Done;
        report.model_trainer = Some(model_trainer);
        report.model_evaluation = Some(model_evaluation);
        report.model_pusher = model_pusher;
        Ok(report)
    }
}
