//! Integration tests for layered configuration loading.

use figment::Figment;
use figment::providers::{Format, Toml};
use forest_core::config::{CONFIG_FILE_NAME, load_config};
use forest_core::{ConfigError, config_exists};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn workspace_file_overrides_defaults() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"
[model]
bucket = "covtype-models"
key = "models/model.json"

[validation]
drift_share = 0.3
"#,
    )
    .unwrap();

    assert!(config_exists(dir.path()));
    let config = load_config(dir.path(), None, None).unwrap();
    assert_eq!(config.model.bucket, "covtype-models");
    assert_eq!(config.model.key, "models/model.json");
    assert_eq!(config.validation.drift_share, 0.3);
    // untouched sections keep their defaults
    assert_eq!(config.prediction.output_file, "predicted.csv");
    assert_eq!(config.artifacts.root_dir, dir.path().join("artifacts"));
}

#[test]
fn missing_workspace_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    assert!(!config_exists(dir.path()));

    let config = load_config(dir.path(), None, None).unwrap();
    assert_eq!(config.model.target_column, "Cover_Type");
    assert_eq!(
        config.schema.path,
        dir.path().join("config").join("schema.yaml")
    );
}

#[test]
fn explicit_file_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");
    let err = load_config(dir.path(), Some(&missing), None).unwrap_err();
    assert!(matches!(err, ConfigError::FileNotFound { path } if path == missing));
}

#[test]
fn overrides_take_precedence() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[store]\nroot = \"from-file\"\n\n[model]\nbucket = \"covtype-models\"\n",
    )
    .unwrap();

    let overrides = Figment::from(Toml::string("[store]\nroot = \"/var/lib/forest\"\n"));
    let config = load_config(dir.path(), None, Some(overrides)).unwrap();
    assert_eq!(config.store.root, PathBuf::from("/var/lib/forest"));
    // keys the override leaves unset keep their file values
    assert_eq!(config.model.bucket, "covtype-models");
    assert_eq!(config.model.key, "model.json");
}

#[test]
fn invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[ingestion]\ntest_split_ratio = 0.0\n",
    )
    .unwrap();

    let err = load_config(dir.path(), None, None).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { .. }));
}
