use crate::infrastructure::config::{ensure_default_configs, load_app_config, AppConfig};
use crate::infrastructure::error::EngineError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub database_path: PathBuf,
    pub logs_dir: PathBuf,
    pub config: AppConfig,
}

/// Prepares a workspace directory for the engine: config, state, and logs
/// subdirectories, default config files, and the schema-initialized
/// database. Safe to call on every startup.
pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, EngineError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join("habitloop.sqlite");

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load_app_config(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        database_path,
        logs_dir,
        config,
    })
}
