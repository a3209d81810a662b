//! Configuration system for the forest pipeline.
//!
//! Uses `figment` for layered configuration: defaults -> `forest.toml` ->
//! environment -> explicit overrides. The resulting [`ForestConfig`] is built
//! once at process start and handed to every component constructor.

use crate::error::ConfigError;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the workspace-level configuration file.
pub const CONFIG_FILE_NAME: &str = "forest.toml";

/// Top-level configuration for the forest pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Local artifact layout.
    #[serde(default)]
    pub artifacts: ArtifactConfig,
    /// Data ingestion stage.
    #[serde(default)]
    pub ingestion: IngestionConfig,
    /// Schema registry source.
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Validation gate and drift detection.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Model trainer stage.
    #[serde(default)]
    pub trainer: TrainerConfig,
    /// Model evaluation stage.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Object store backend.
    #[serde(default)]
    pub store: StoreConfig,
    /// Remote model location and target column.
    #[serde(default)]
    pub model: ModelConfig,
    /// Prediction input/output locations.
    #[serde(default)]
    pub prediction: PredictionConfig,
}

impl ForestConfig {
    /// Anchor every relative local path at `workspace`.
    pub fn with_workspace(mut self, workspace: &Path) -> Self {
        let anchor = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = workspace.join(&*p);
            }
        };
        anchor(&mut self.artifacts.root_dir);
        anchor(&mut self.ingestion.source_path);
        anchor(&mut self.schema.path);
        anchor(&mut self.store.root);
        self
    }

    /// Reject values no pipeline run could succeed with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ratio = self.ingestion.test_split_ratio;
        if !(ratio > 0.0 && ratio < 1.0) {
            return Err(ConfigError::Invalid {
                message: format!("ingestion.test_split_ratio must be within (0, 1), got {ratio}"),
            });
        }
        if !(0.0..=1.0).contains(&self.validation.drift_share) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "validation.drift_share must be within [0, 1], got {}",
                    self.validation.drift_share
                ),
            });
        }
        if self.model.target_column.is_empty() {
            return Err(ConfigError::Invalid {
                message: "model.target_column must not be empty".into(),
            });
        }
        Ok(())
    }
}

/// Local artifact layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    /// Directory under which every stage writes its outputs.
    #[serde(default = "default_artifacts_dir")]
    pub root_dir: PathBuf,
    /// Namespace each run under a timestamp directory instead of overwriting
    /// the fixed layout.
    #[serde(default)]
    pub run_scoped: bool,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            root_dir: default_artifacts_dir(),
            run_scoped: false,
        }
    }
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

/// Data ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Raw CSV exported into the feature store.
    #[serde(default = "default_source_path")]
    pub source_path: PathBuf,
    #[serde(default = "default_ingestion_dir")]
    pub dir: String,
    #[serde(default = "default_feature_store_dir")]
    pub feature_store_dir: String,
    #[serde(default = "default_feature_store_file")]
    pub feature_store_file: String,
    #[serde(default = "default_ingested_dir")]
    pub ingested_dir: String,
    #[serde(default = "default_train_file")]
    pub train_file: String,
    #[serde(default = "default_test_file")]
    pub test_file: String,
    /// Fraction of rows held out as the test split.
    #[serde(default = "default_test_split_ratio")]
    pub test_split_ratio: f64,
    /// Seed for the row shuffle, so splits are reproducible.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            source_path: default_source_path(),
            dir: default_ingestion_dir(),
            feature_store_dir: default_feature_store_dir(),
            feature_store_file: default_feature_store_file(),
            ingested_dir: default_ingested_dir(),
            train_file: default_train_file(),
            test_file: default_test_file(),
            test_split_ratio: default_test_split_ratio(),
            seed: default_seed(),
        }
    }
}

fn default_source_path() -> PathBuf {
    PathBuf::from("data").join("covtype.csv")
}

fn default_ingestion_dir() -> String {
    "data_ingestion".to_string()
}

fn default_feature_store_dir() -> String {
    "feature_store".to_string()
}

fn default_feature_store_file() -> String {
    "covtype.csv".to_string()
}

fn default_ingested_dir() -> String {
    "ingested".to_string()
}

fn default_train_file() -> String {
    "train.csv".to_string()
}

fn default_test_file() -> String {
    "test.csv".to_string()
}

fn default_test_split_ratio() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

/// Schema registry source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default = "default_schema_path")]
    pub path: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            path: default_schema_path(),
        }
    }
}

fn default_schema_path() -> PathBuf {
    PathBuf::from("config").join("schema.yaml")
}

/// Validation gate and drift detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_validation_dir")]
    pub dir: String,
    #[serde(default = "default_drift_report_dir")]
    pub drift_report_dir: String,
    #[serde(default = "default_drift_report_file")]
    pub drift_report_file: String,
    /// p-value below which a numerical column is considered drifted.
    #[serde(default = "default_numerical_threshold")]
    pub numerical_threshold: f64,
    /// Jensen-Shannon distance at or above which a categorical column is drifted.
    #[serde(default = "default_categorical_threshold")]
    pub categorical_threshold: f64,
    /// Share of drifted columns at or above which the dataset is drifted.
    #[serde(default = "default_drift_share")]
    pub drift_share: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            dir: default_validation_dir(),
            drift_report_dir: default_drift_report_dir(),
            drift_report_file: default_drift_report_file(),
            numerical_threshold: default_numerical_threshold(),
            categorical_threshold: default_categorical_threshold(),
            drift_share: default_drift_share(),
        }
    }
}

fn default_validation_dir() -> String {
    "data_validation".to_string()
}

fn default_drift_report_dir() -> String {
    "drift_report".to_string()
}

fn default_drift_report_file() -> String {
    "report.yaml".to_string()
}

fn default_numerical_threshold() -> f64 {
    0.05
}

fn default_categorical_threshold() -> f64 {
    0.1
}

fn default_drift_share() -> f64 {
    0.5
}

/// Model trainer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    #[serde(default = "default_trainer_dir")]
    pub dir: String,
    #[serde(default = "default_model_file")]
    pub model_file: String,
    /// Minimum test-split accuracy a freshly trained model must reach.
    #[serde(default = "default_expected_accuracy")]
    pub expected_accuracy: f64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            dir: default_trainer_dir(),
            model_file: default_model_file(),
            expected_accuracy: default_expected_accuracy(),
        }
    }
}

fn default_trainer_dir() -> String {
    "model_trainer".to_string()
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_expected_accuracy() -> f64 {
    0.6
}

/// Model evaluation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Accuracy gain over the deployed model required to replace it.
    #[serde(default = "default_changed_threshold")]
    pub changed_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            changed_threshold: default_changed_threshold(),
        }
    }
}

fn default_changed_threshold() -> f64 {
    0.02
}

/// Object store backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one sub-directory per bucket.
    #[serde(default = "default_store_root")]
    pub root: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_store_root(),
        }
    }
}

fn default_store_root() -> PathBuf {
    PathBuf::from(".forest").join("store")
}

/// Remote model location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_bucket")]
    pub bucket: String,
    #[serde(default = "default_model_key")]
    pub key: String,
    /// Column the model predicts; appended to prediction output.
    #[serde(default = "default_target_column")]
    pub target_column: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            bucket: default_model_bucket(),
            key: default_model_key(),
            target_column: default_target_column(),
        }
    }
}

fn default_model_bucket() -> String {
    "forest-model".to_string()
}

fn default_model_key() -> String {
    "model.json".to_string()
}

fn default_target_column() -> String {
    "Cover_Type".to_string()
}

/// Prediction input/output locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    #[serde(default = "default_data_bucket")]
    pub data_bucket: String,
    #[serde(default = "default_data_key")]
    pub data_key: String,
    #[serde(default = "default_output_folder")]
    pub output_folder: String,
    #[serde(default = "default_output_file")]
    pub output_file: String,
}

impl PredictionConfig {
    /// Key the prediction output is uploaded to inside `data_bucket`.
    pub fn output_key(&self) -> String {
        if self.output_folder.is_empty() {
            self.output_file.clone()
        } else {
            format!(
                "{}/{}",
                self.output_folder.trim_end_matches('/'),
                self.output_file
            )
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            data_bucket: default_data_bucket(),
            data_key: default_data_key(),
            output_folder: default_output_folder(),
            output_file: default_output_file(),
        }
    }
}

fn default_data_bucket() -> String {
    "forest-data".to_string()
}

fn default_data_key() -> String {
    "prediction/input.csv".to_string()
}

fn default_output_folder() -> String {
    "predictions".to_string()
}

fn default_output_file() -> String {
    "predicted.csv".to_string()
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides: a partial layer, so only the keys it sets win
/// 2. Environment variables (prefixed with `FOREST_`, nested keys split on `__`)
/// 3. `config_file`, or `<workspace>/forest.toml` when none is given
/// 4. Built-in defaults
///
/// Relative paths in the result are anchored at `workspace`.
pub fn load_config(
    workspace: &Path,
    config_file: Option<&Path>,
    overrides: Option<Figment>,
) -> Result<ForestConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(ForestConfig::default()));

    match config_file {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            figment = figment.merge(Toml::file(path));
        }
        None => {
            let ws_config = workspace.join(CONFIG_FILE_NAME);
            if ws_config.exists() {
                figment = figment.merge(Toml::file(&ws_config));
            }
        }
    }

    // FOREST_MODEL__BUCKET, FOREST_INGESTION__TEST_SPLIT_RATIO, etc.
    figment = figment.merge(Env::prefixed("FOREST_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(overrides);
    }

    let config: ForestConfig = figment.extract().map_err(Box::new)?;
    config.validate()?;
    tracing::debug!(workspace = %workspace.display(), "configuration loaded");
    Ok(config.with_workspace(workspace))
}

/// Check whether a workspace configuration file exists.
pub fn config_exists(workspace: &Path) -> bool {
    workspace.join(CONFIG_FILE_NAME).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ForestConfig::default();
        assert_eq!(config.model.target_column, "Cover_Type");
        assert_eq!(config.ingestion.test_split_ratio, 0.2);
        assert_eq!(config.validation.drift_report_file, "report.yaml");
        assert!(!config.artifacts.run_scoped);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_output_key() {
        let mut prediction = PredictionConfig::default();
        assert_eq!(prediction.output_key(), "predictions/predicted.csv");
        prediction.output_folder = String::new();
        assert_eq!(prediction.output_key(), "predicted.csv");
    }

    #[test]
    fn test_with_workspace_anchors_relative_paths() {
        let config = ForestConfig::default().with_workspace(Path::new("/srv/forest"));
        assert_eq!(config.artifacts.root_dir, PathBuf::from("/srv/forest/artifacts"));
        assert_eq!(
            config.schema.path,
            PathBuf::from("/srv/forest/config/schema.yaml")
        );
        assert_eq!(config.store.root, PathBuf::from("/srv/forest/.forest/store"));
    }

    #[test]
    fn test_with_workspace_keeps_absolute_paths() {
        let mut config = ForestConfig::default();
        config.store.root = PathBuf::from("/mnt/buckets");
        let config = config.with_workspace(Path::new("/srv/forest"));
        assert_eq!(config.store.root, PathBuf::from("/mnt/buckets"));
    }

    #[test]
    fn test_validate_rejects_bad_ratio() {
        let mut config = ForestConfig::default();
        config.ingestion.test_split_ratio = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ForestConfig = toml::from_str("[model]\nbucket = \"prod-models\"\n").unwrap();
        assert_eq!(config.model.bucket, "prod-models");
        assert_eq!(config.model.key, "model.json");
        assert_eq!(config.prediction.data_bucket, "forest-data");
    }
}
