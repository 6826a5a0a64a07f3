//! `tactician agents`: list persisted agents.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::output::{output, table, CommandOutput};
use crate::domain::models::AgentProfile;

#[derive(Debug, Serialize)]
pub struct AgentListOutput {
    pub agents: Vec<AgentProfile>,
    pub total: usize,
}

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No agents found.".to_string();
        }

        let mut t = table(&["ID", "NAME", "CLASS"]);
        for agent in &self.agents {
            t.add_row(vec![agent.agent_id.as_str(), agent.name.as_str(), agent.class.as_str()]);
        }
        format!("Found {} agent(s):\n{t}", self.total)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(dir: &Path, json_mode: bool) -> Result<()> {
    let config = super::load_config(dir)?;
    let repository = super::open_repository(dir, &config).await?;
    let agents = repository.list_agents().await?;

    output(
        &AgentListOutput {
            total: agents.len(),
            agents,
        },
        json_mode,
    );
    Ok(())
}
