//! `tactician status`: what a persisted agent has learned.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;

use crate::cli::output::{output, table, truncate, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{AgentSnapshot, ArmStat};

#[derive(Debug, Serialize)]
pub struct ArmOutput {
    pub key: String,
    pub pulls: u64,
    pub mean_reward: f64,
}

impl<K: ToString> From<&ArmStat<K>> for ArmOutput {
    fn from(stat: &ArmStat<K>) -> Self {
        Self {
            key: stat.key.to_string(),
            pulls: stat.pull_count,
            mean_reward: stat.mean_reward(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VariantOutput {
    pub id: String,
    pub generation: u32,
    pub pulls: u64,
    pub mean_reward: f64,
    pub preview: String,
}

#[derive(Debug, Serialize)]
pub struct StatusOutput {
    pub agent_id: String,
    pub name: String,
    pub class: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_rate: f64,
    pub games_since_evolution: u32,
    pub episodes: usize,
    pub known_opponents: usize,
    pub actions: Vec<ArmOutput>,
    pub variants: Vec<VariantOutput>,
    pub saved_at: String,
}

impl StatusOutput {
    /// Actions and variants ranked by mean reward, highest first, at most `limit` each.
    pub fn from_snapshot(snapshot: &AgentSnapshot, limit: usize) -> Self {
        let mut actions: Vec<ArmOutput> = snapshot.action_stats.iter().map(ArmOutput::from).collect();
        actions.sort_by(|a, b| b.mean_reward.total_cmp(&a.mean_reward));
        actions.truncate(limit);

        let mut variants: Vec<VariantOutput> = snapshot
            .prompt_pool
            .variants
            .iter()
            .map(|variant| {
                let stat = snapshot.prompt_pool.stats.iter().find(|s| s.key == variant.id);
                VariantOutput {
                    id: variant.id.to_string(),
                    generation: variant.generation,
                    pulls: stat.map_or(0, |s| s.pull_count),
                    mean_reward: stat.map_or(0.0, ArmStat::mean_reward),
                    preview: truncate(&variant.text.replace('\n', " "), 60),
                }
            })
            .collect();
        variants.sort_by(|a, b| b.mean_reward.total_cmp(&a.mean_reward));
        variants.truncate(limit);

        Self {
            agent_id: snapshot.profile.agent_id.clone(),
            name: snapshot.profile.name.clone(),
            class: snapshot.profile.class.clone(),
            wins: snapshot.record.wins,
            losses: snapshot.record.losses,
            draws: snapshot.record.draws,
            win_rate: snapshot.record.win_rate(),
            games_since_evolution: snapshot.games_since_evolution,
            episodes: snapshot.memory.episodes.len(),
            known_opponents: snapshot.opponents.entries().len(),
            actions,
            variants,
            saved_at: snapshot.saved_at.to_rfc3339(),
        }
    }
}

impl CommandOutput for StatusOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Agent: {} ({}), {}", self.name, self.agent_id, self.class),
            format!(
                "Record: {}W {}L {}D  win rate {:.1}%",
                self.wins,
                self.losses,
                self.draws,
                self.win_rate * 100.0
            ),
            format!(
                "Games since evolution: {}  episodes: {}  opponents: {}",
                self.games_since_evolution, self.episodes, self.known_opponents
            ),
            format!("Saved: {}", self.saved_at),
        ];

        if !self.actions.is_empty() {
            let mut t = table(&["ACTION", "PULLS", "MEAN"]);
            for action in &self.actions {
                t.add_row(vec![
                    action.key.clone(),
                    action.pulls.to_string(),
                    format!("{:.3}", action.mean_reward),
                ]);
            }
            lines.push(format!("\nActions:\n{t}"));
        }

        let mut t = table(&["VARIANT", "GEN", "PULLS", "MEAN", "PROMPT"]);
        for variant in &self.variants {
            t.add_row(vec![
                variant.id.clone(),
                variant.generation.to_string(),
                variant.pulls.to_string(),
                format!("{:.3}", variant.mean_reward),
                variant.preview.clone(),
            ]);
        }
        lines.push(format!("\nPrompt pool:\n{t}"));

        lines.join("\n")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(agent_id: &str, limit: usize, dir: &Path, json_mode: bool) -> Result<()> {
    let config = super::load_config(dir)?;
    let repository = super::open_repository(dir, &config).await?;

    let snapshot = repository
        .load(agent_id)
        .await?
        .ok_or_else(|| DomainError::AgentNotFound(agent_id.to_string()))?;

    output(&StatusOutput::from_snapshot(&snapshot, limit), json_mode);
    Ok(())
}
