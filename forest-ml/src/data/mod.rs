//! Tabular data: frames, CSV I/O, schema, ingestion, validation, and drift.

pub mod drift;
pub mod frame;
pub mod ingest;
pub mod io;
pub mod schema;
pub mod validate;

pub use drift::{DriftDetector, DriftReport};
pub use frame::{Column, ColumnData, ColumnType, DataFrame};
pub use ingest::DataIngestion;
pub use schema::SchemaSpec;
pub use validate::{DataValidation, ValidationOutcome};
