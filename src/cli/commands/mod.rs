//! CLI command implementations.

pub mod agents;
pub mod config;
pub mod status;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::adapters::sqlite::{initialize_database, SqliteStateRepository};
use crate::domain::models::Config;
use crate::domain::ports::AgentStateRepository;
use crate::infrastructure::config::ConfigLoader;

/// Effective configuration for the project at `dir`.
pub fn load_config(dir: &Path) -> Result<Config> {
    ConfigLoader::load_from_dir(dir)
}

/// Open the configured state database, resolving a relative path against `dir`.
pub async fn open_repository(dir: &Path, config: &Config) -> Result<Arc<dyn AgentStateRepository>> {
    let mut database = config.database.clone();
    if !database.path.starts_with("sqlite:") && Path::new(&database.path).is_relative() {
        database.path = dir.join(&database.path).to_string_lossy().into_owned();
    }
    let pool = initialize_database(&database)
        .await
        .with_context(|| format!("Failed to open state database at {}", database.path))?;
    Ok(Arc::new(SqliteStateRepository::new(pool)))
}
