//! Stage artifacts, the on-disk artifact layout, and the training run lock.

use crate::data::validate::ValidationOutcome;
use crate::error::MlError;
use chrono::Local;
use forest_core::ForestConfig;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Timestamp format of run-scoped artifact directories.
pub const RUN_DIR_FORMAT: &str = "%m_%d_%Y_%H_%M_%S";

/// Name of the lock file held under the artifact root during a training run.
pub const RUN_LOCK_FILE: &str = ".run.lock";

/// Resolved local paths for one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactLayout {
    pub root_dir: PathBuf,
    pub run_dir: PathBuf,
    pub feature_store_file: PathBuf,
    pub train_file: PathBuf,
    pub test_file: PathBuf,
    pub drift_report_file: PathBuf,
    pub trained_model_file: PathBuf,
}

impl ArtifactLayout {
    /// Layout for a new run. With `artifacts.run_scoped` the run gets its own
    /// timestamp directory; otherwise the fixed paths under the root are reused.
    pub fn new(config: &ForestConfig) -> Self {
        let root = &config.artifacts.root_dir;
        let run_dir = if config.artifacts.run_scoped {
            root.join(Local::now().format(RUN_DIR_FORMAT).to_string())
        } else {
            root.clone()
        };
        Self::for_run_dir(config, run_dir)
    }

    /// Layout rooted at an explicit run directory.
    pub fn for_run_dir(config: &ForestConfig, run_dir: PathBuf) -> Self {
        let ingestion = &config.ingestion;
        let ingestion_dir = run_dir.join(&ingestion.dir);
        let ingested_dir = ingestion_dir.join(&ingestion.ingested_dir);
        let validation = &config.validation;

        Self {
            root_dir: config.artifacts.root_dir.clone(),
            feature_store_file: ingestion_dir
                .join(&ingestion.feature_store_dir)
                .join(&ingestion.feature_store_file),
            train_file: ingested_dir.join(&ingestion.train_file),
            test_file: ingested_dir.join(&ingestion.test_file),
            drift_report_file: run_dir
                .join(&validation.dir)
                .join(&validation.drift_report_dir)
                .join(&validation.drift_report_file),
            trained_model_file: run_dir
                .join(&config.trainer.dir)
                .join(&config.trainer.model_file),
            run_dir,
        }
    }
}

/// Exclusive claim on an artifact root for the duration of a training run.
///
/// The lock file is created with `create_new` and records the holder's PID.
/// A lock whose holder process is gone is stale and is taken over. The file
/// is removed when the lock is dropped.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(root_dir: &Path) -> Result<Self, MlError> {
        std::fs::create_dir_all(root_dir)?;
        let path = root_dir.join(RUN_LOCK_FILE);
        match Self::create(&path)? {
            Some(lock) => Ok(lock),
            None if Self::is_stale(&path) => {
                tracing::warn!(path = %path.display(), "removing stale run lock");
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
                // Another run may win the race for the freed lock.
                Self::create(&path)?.ok_or(MlError::RunInProgress { path })
            }
            None => Err(MlError::RunInProgress { path }),
        }
    }

    /// `None` when the lock file already exists.
    fn create(path: &Path) -> Result<Option<Self>, MlError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        tracing::debug!(path = %path.display(), "run lock acquired");
        Ok(Some(Self {
            path: path.to_path_buf(),
        }))
    }

    // A lock without a readable PID may still be mid-write, so it counts as held.
    fn is_stale(path: &Path) -> bool {
        let Ok(content) = std::fs::read_to_string(path) else {
            return false;
        };
        match content.trim().parse::<u32>() {
            Ok(pid) => !is_process_running(pid),
            Err(_) => false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_process_running(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };
        if pid <= 0 {
            return false;
        }
        // EPERM: the process exists but belongs to another user.
        (unsafe { libc::kill(pid, 0) == 0 })
            || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release run lock");
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataIngestionArtifact {
    pub feature_store_file_path: PathBuf,
    pub trained_file_path: PathBuf,
    pub test_file_path: PathBuf,
}

/// Result of the validation gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValidationArtifact {
    pub outcome: ValidationOutcome,
    pub drift_report_file_path: PathBuf,
    /// `None` when the gate failed and drift was never computed.
    pub dataset_drift: Option<bool>,
}

impl DataValidationArtifact {
    pub fn validation_status(&self) -> bool {
        self.outcome.is_passed()
    }

    /// Accumulated failure reasons; empty iff validation passed.
    pub fn message(&self) -> &str {
        self.outcome.reason()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetric {
    pub accuracy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelTrainerArtifact {
    pub trained_model_file_path: PathBuf,
    pub train_metric: ClassificationMetric,
    /// Accuracy on the held-out test split.
    pub metric: ClassificationMetric,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvaluationArtifact {
    pub is_model_accepted: bool,
    /// Trained accuracy minus deployed accuracy (or the trained accuracy when
    /// nothing is deployed).
    pub changed_accuracy: f64,
    pub remote_accuracy: Option<f64>,
    pub trained_model_path: PathBuf,
    pub remote_model_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPusherArtifact {
    pub bucket: String,
    pub key: String,
    /// Hex SHA-256 of the pushed model bytes.
    pub sha256: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn config(root: &Path) -> ForestConfig {
        let mut config = ForestConfig::default();
        config.artifacts.root_dir = root.to_path_buf();
        config
    }

    #[test]
    fn test_fixed_layout() {
        let layout = ArtifactLayout::new(&config(Path::new("/ws/artifacts")));
        assert_eq!(layout.run_dir, PathBuf::from("/ws/artifacts"));
        assert_eq!(
            layout.feature_store_file,
            PathBuf::from("/ws/artifacts/data_ingestion/feature_store/covtype.csv")
        );
        assert_eq!(
            layout.train_file,
            PathBuf::from("/ws/artifacts/data_ingestion/ingested/train.csv")
        );
        assert_eq!(
            layout.test_file,
            PathBuf::from("/ws/artifacts/data_ingestion/ingested/test.csv")
        );
        assert_eq!(
            layout.drift_report_file,
            PathBuf::from("/ws/artifacts/data_validation/drift_report/report.yaml")
        );
        assert_eq!(
            layout.trained_model_file,
            PathBuf::from("/ws/artifacts/model_trainer/model.json")
        );
    }

    #[test]
    fn test_run_scoped_layout() {
        let mut cfg = config(Path::new("/ws/artifacts"));
        cfg.artifacts.run_scoped = true;
        let layout = ArtifactLayout::new(&cfg);

        assert_eq!(layout.root_dir, PathBuf::from("/ws/artifacts"));
        assert_eq!(layout.run_dir.parent(), Some(Path::new("/ws/artifacts")));
        let stamp = layout.run_dir.file_name().unwrap().to_string_lossy();
        assert_eq!(stamp.split('_').count(), 6);
        assert!(layout.train_file.starts_with(&layout.run_dir));
    }

    #[test]
    fn test_run_lock_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        assert!(lock.path().exists());

        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, MlError::RunInProgress { .. }));

        drop(lock);
        assert!(!dir.path().join(RUN_LOCK_FILE).exists());
        RunLock::acquire(dir.path()).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_run_lock_left_by_dead_process_is_taken_over() {
        let dir = TempDir::new().unwrap();
        let mut child = std::process::Command::new("true").spawn().unwrap();
        let dead_pid = child.id();
        child.wait().unwrap();
        std::fs::write(dir.path().join(RUN_LOCK_FILE), format!("{dead_pid}\n")).unwrap();

        let lock = RunLock::acquire(dir.path()).unwrap();
        let holder = std::fs::read_to_string(lock.path()).unwrap();
        assert_eq!(holder.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_run_lock_held_by_live_process_is_kept() {
        let dir = TempDir::new().unwrap();
        let lock = RunLock::acquire(dir.path()).unwrap();
        std::mem::forget(lock);

        // This process is still running, so the abandoned lock is not stale.
        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, MlError::RunInProgress { .. }));
    }

    #[test]
    fn test_run_lock_without_pid_is_kept() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(RUN_LOCK_FILE), "").unwrap();
        let err = RunLock::acquire(dir.path()).unwrap_err();
        assert!(matches!(err, MlError::RunInProgress { .. }));
    }

    #[test]
    fn test_validation_artifact_accessors() {
        let passed = DataValidationArtifact {
            outcome: ValidationOutcome::Passed,
            drift_report_file_path: PathBuf::from("report.yaml"),
            dataset_drift: Some(false),
        };
        assert!(passed.validation_status());
        assert_eq!(passed.message(), "");

        let failed = DataValidationArtifact {
            outcome: ValidationOutcome::Failed {
                reason: "Columns are missing in train dataframe. ".into(),
            },
            drift_report_file_path: PathBuf::from("report.yaml"),
            dataset_drift: None,
        };
        assert!(!failed.validation_status());
        assert!(failed.message().contains("Columns are missing in train dataframe."));
    }
}
