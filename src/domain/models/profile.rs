//! Agent identity, battle record, and per-opponent tendencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::ActionKey;
use super::battle::BattleOutcome;

/// Damage at or above which an opponent's move counts as effective against us.
pub const EFFECTIVE_HIT_DAMAGE: u32 = 20;

/// Who the agent is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentProfile {
    pub agent_id: String,
    pub name: String,
    pub class: String,
}

impl AgentProfile {
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            class: class.into(),
        }
    }
}

/// Lifetime results for one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRecord {
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub damage_dealt: u64,
    pub damage_taken: u64,
}

impl BattleRecord {
    pub fn games(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    pub fn win_rate(&self) -> f64 {
        match self.games() {
            0 => 0.0,
            games => f64::from(self.wins) / f64::from(games),
        }
    }

    pub fn record(&mut self, outcome: BattleOutcome) {
        match outcome {
            BattleOutcome::Won => self.wins += 1,
            BattleOutcome::Lost => self.losses += 1,
            BattleOutcome::Draw => self.draws += 1,
        }
    }
}

/// Net effectiveness of each opponent move, keyed by opponent id.
///
/// A move that hit for at least [`EFFECTIVE_HIT_DAMAGE`] scores +1, a weaker hit -1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpponentModel(BTreeMap<String, BTreeMap<ActionKey, i64>>);

impl OpponentModel {
    pub fn observe(&mut self, opponent_id: &str, action: &ActionKey, damage_taken: u32) {
        if damage_taken == 0 {
            return;
        }
        let delta = if damage_taken >= EFFECTIVE_HIT_DAMAGE { 1 } else { -1 };
        *self
            .0
            .entry(opponent_id.to_string())
            .or_default()
            .entry(action.clone())
            .or_insert(0) += delta;
    }

    /// `"effective: a, b; less useful: c"`, or `None` for an unknown opponent.
    pub fn insight(&self, opponent_id: &str) -> Option<String> {
        let tendencies = self.0.get(opponent_id)?;
        let mut ranked: Vec<(&ActionKey, i64)> =
            tendencies.iter().map(|(action, score)| (action, *score)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let effective: Vec<&str> = ranked
            .iter()
            .filter(|(_, score)| *score > 0)
            .take(2)
            .map(|(action, _)| action.as_str())
            .collect();
        let weak: Vec<&str> = ranked
            .iter()
            .rev()
            .filter(|(_, score)| *score < 0)
            .take(2)
            .map(|(action, _)| action.as_str())
            .collect();

        let mut parts = Vec::new();
        if !effective.is_empty() {
            parts.push(format!("effective: {}", effective.join(", ")));
        }
        if !weak.is_empty() {
            parts.push(format!("less useful: {}", weak.join(", ")));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }

    pub fn entries(&self) -> &BTreeMap<String, BTreeMap<ActionKey, i64>> {
        &self.0
    }
}
