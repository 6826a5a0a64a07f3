//! Episodes: remembered (situation, action, outcome) triples.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::ActionKey;

/// Outcome reward above which a recalled action is described as having worked.
pub const WORKED_THRESHOLD: f64 = 0.3;

/// An immutable record of one decided turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Monotonic insertion order within one memory.
    pub sequence: u64,
    /// Hex SHA-256 of `canonical_state`.
    pub state_hash: String,
    pub canonical_state: String,
    pub state_summary: String,
    pub embedding: Vec<f32>,
    pub action: ActionKey,
    pub outcome_reward: f64,
    pub recorded_at: DateTime<Utc>,
}

impl Episode {
    pub fn worked(&self) -> bool {
        self.outcome_reward > WORKED_THRESHOLD
    }
}

/// An episode returned from a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedEpisode {
    pub episode: Episode,
    pub similarity: f32,
}

impl RetrievedEpisode {
    /// Natural-language hint for the decision context.
    pub fn summary(&self) -> String {
        let verdict = if self.episode.worked() {
            "worked"
        } else {
            "backfired"
        };
        format!(
            "{} {} in a similar spot ({}; reward {:.2}, similarity {:.2})",
            self.episode.action,
            verdict,
            self.episode.state_summary,
            self.episode.outcome_reward,
            self.similarity,
        )
    }
}
