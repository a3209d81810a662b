//! CLI command handlers.

use crate::{Commands, ConfigAction};
use forest_core::ForestConfig;
use forest_core::config::CONFIG_FILE_NAME;
use forest_ml::pipeline::TrainingReport;
use forest_ml::{FsObjectStore, PredictionPipeline, StorageService, TrainPipeline, TrainingState};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match command {
        Commands::Train => handle_train(workspace, config_file),
        Commands::Predict => handle_predict(workspace, config_file),
        Commands::Config { action } => handle_config(action, workspace, config_file),
    }
}

fn load(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<ForestConfig> {
    forest_core::load_config(workspace, config_file, None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))
}

fn storage(config: &ForestConfig) -> StorageService {
    StorageService::new(Arc::new(FsObjectStore::new(&config.store.root)))
}

fn handle_train(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    let config = load(workspace, config_file)?;
    let report = TrainPipeline::new(&config, storage(&config)).run_pipeline()?;
    println!("{}", summarize(&report));
    Ok(())
}

fn handle_predict(workspace: &Path, config_file: Option<&Path>) -> anyhow::Result<()> {
    let config = load(workspace, config_file)?;
    let pipeline = PredictionPipeline::new(&config, storage(&config));
    let output = pipeline.initiate_prediction()?;
    println!(
        "Wrote {} predictions to {}/{}",
        output.row_count(),
        config.prediction.data_bucket,
        pipeline.output_key()
    );
    Ok(())
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = init_config(workspace)?;
            println!("Configuration file at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, config_file)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

/// Write the default configuration unless one already exists.
fn init_config(workspace: &Path) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(workspace)?;
    let config_path = workspace.join(CONFIG_FILE_NAME);
    if forest_core::config_exists(workspace) {
        tracing::info!(path = %config_path.display(), "configuration already exists");
        return Ok(config_path);
    }
    let toml_str = toml::to_string_pretty(&ForestConfig::default())?;
    std::fs::write(&config_path, toml_str)?;
    tracing::info!(path = %config_path.display(), "created default configuration");
    Ok(config_path)
}

fn summarize(report: &TrainingReport) -> String {
    match report.state {
        TrainingState::Halted => format!(
            "Training halted: {}",
            report.data_validation.message().trim_end()
        ),
        _ => match (&report.model_trainer, &report.model_pusher) {
            (Some(trainer), Some(pushed)) => format!(
                "Training done: accuracy {:.4}, pushed {}/{} (sha256 {})",
                trainer.metric.accuracy, pushed.bucket, pushed.key, pushed.sha256
            ),
            (Some(trainer), None) => format!(
                "Training done: accuracy {:.4}, deployed model kept",
                trainer.metric.accuracy
            ),
            _ => format!("Training {}", report.state),
        },
    }
}
