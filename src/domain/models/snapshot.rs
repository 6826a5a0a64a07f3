//! Serializable snapshots of an agent's learned state.
//!
//! Snapshots are the persistence boundary: the repository stores and loads exactly
//! these structures, and the services rebuild themselves from them without loss.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::arm::{ActionStat, VariantStat};
use super::episode::Episode;
use super::profile::{AgentProfile, BattleRecord, OpponentModel};
use super::prompt::PromptVariant;

/// Prompt pool contents in pool order, with one stat per variant.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptPoolSnapshot {
    pub variants: Vec<PromptVariant>,
    pub stats: Vec<VariantStat>,
}

/// Episodic memory contents in sequence order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub episodes: Vec<Episode>,
    pub next_sequence: u64,
}

/// Everything an agent has learned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub profile: AgentProfile,
    pub record: BattleRecord,
    pub games_since_evolution: u32,
    /// Action stats in tracker insertion order.
    pub action_stats: Vec<ActionStat>,
    pub prompt_pool: PromptPoolSnapshot,
    pub memory: MemorySnapshot,
    #[serde(default)]
    pub opponents: OpponentModel,
    pub saved_at: DateTime<Utc>,
}

impl AgentSnapshot {
    /// The same snapshot stamped with a different save time.
    #[must_use]
    pub fn with_saved_at(self, saved_at: DateTime<Utc>) -> Self {
        Self { saved_at, ..self }
    }
}
