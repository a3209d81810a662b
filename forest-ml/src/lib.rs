//! # forest-ml: validated training & prediction for tabular data
//!
//! The training pipeline ingests a raw dataset, gates it against a declared
//! schema, checks the train/test splits for drift, and trains, evaluates and
//! publishes a classifier. The prediction pipeline fetches input data from an
//! object store, labels it with the published model, and uploads the result.
//!
//! ## Guarantees
//! 1. **Gate before training**: a dataset that does not match the schema never
//!    reaches the trainer; the run halts with the accumulated reasons.
//! 2. **Attributed failures**: every stage error is wrapped in
//!    [`MlError::Stage`] so callers see which step failed and why.
//! 3. **Load once**: a [`RemoteModelStore`] deserializes its model at most once.

// Foundation
pub mod error;

// Data engineering
pub mod data;

// Model & storage
pub mod model;
pub mod store;

// Orchestration
pub mod pipeline;

// Re-exports
pub use data::{DataFrame, SchemaSpec, ValidationOutcome};
pub use error::{MlError, Stage, StageExt};
pub use model::{Estimator, ForestModel, RemoteModelStore};
pub use pipeline::{PredictionPipeline, TrainPipeline, TrainingReport, TrainingState};
pub use store::{FsObjectStore, MemoryObjectStore, ObjectStore, StorageService};
