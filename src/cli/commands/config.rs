//! `tactician config show`: print the effective configuration.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::cli::output::{output, CommandOutput};
use crate::cli::types::ConfigCommands;
use crate::domain::models::Config;

#[derive(Debug, Serialize)]
#[serde(transparent)]
pub struct ConfigOutput {
    pub config: Config,
}

impl CommandOutput for ConfigOutput {
    fn to_human(&self) -> String {
        serde_yaml::to_string(&self.config).unwrap_or_default()
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(command: &ConfigCommands, dir: &Path, json_mode: bool) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let config = super::load_config(dir).context("Failed to load configuration")?;
            output(&ConfigOutput { config }, json_mode);
            Ok(())
        }
    }
}
