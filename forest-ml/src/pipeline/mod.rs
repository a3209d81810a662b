//! Training and prediction orchestrators and their stages.

pub mod artifact;
pub mod evaluation;
pub mod prediction;
pub mod pusher;
pub mod trainer;
pub mod training;

pub use artifact::{
    ArtifactLayout, ClassificationMetric, DataIngestionArtifact, DataValidationArtifact,
    ModelEvaluationArtifact, ModelPusherArtifact, ModelTrainerArtifact, RunLock,
};
pub use evaluation::ModelEvaluation;
pub use prediction::PredictionPipeline;
pub use pusher::ModelPusher;
pub use trainer::ModelTrainer;
pub use training::{TrainPipeline, TrainingReport, TrainingState};
