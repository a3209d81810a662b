//! # forest-core
//!
//! Foundations shared by the forest pipeline crates: layered configuration,
//! atomic persistence helpers, and configuration errors.

pub mod config;
pub mod error;
pub mod persistence;

// Re-export commonly used types at the crate root.
pub use config::{ForestConfig, config_exists, load_config};
pub use error::ConfigError;
