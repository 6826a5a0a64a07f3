//! Action identifiers and the structured decisions that name them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Action categories understood by the bundled battle prompts.
pub const STANDARD_ACTIONS: [&str; 8] = [
    "attack",
    "defend",
    "cast_spell",
    "use_item",
    "negotiate",
    "flee",
    "taunt",
    "observe",
];

/// Stable identifier for an action's semantic category.
///
/// Keys are normalized on construction (trimmed, lowercased, inner whitespace and
/// hyphens folded to `_`) so `"Cast Spell"` and `"cast_spell"` address the same arm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionKey(String);

impl ActionKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let normalized = raw
            .as_ref()
            .trim()
            .split(|c: char| c.is_whitespace() || c == '-')
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("_")
            .to_lowercase();
        Self(normalized)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ActionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionKey {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for ActionKey {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// The full standard action set as keys.
pub fn standard_actions() -> Vec<ActionKey> {
    STANDARD_ACTIONS.iter().copied().map(ActionKey::new).collect()
}

/// Where a turn's action came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Validated reply from the decision maker.
    Model,
    /// Bandit fallback after the decision maker was unavailable, rate-limited, or malformed.
    Fallback,
}

impl DecisionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Fallback => "fallback",
        }
    }
}

/// A validated move handed to the game engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredAction {
    pub action: ActionKey,
    pub narration: String,
    pub source: DecisionSource,
}

impl StructuredAction {
    pub fn from_model(action: ActionKey, narration: impl Into<String>) -> Self {
        Self {
            action,
            narration: narration.into(),
            source: DecisionSource::Model,
        }
    }

    pub fn fallback(action: ActionKey, narration: impl Into<String>) -> Self {
        Self {
            action,
            narration: narration.into(),
            source: DecisionSource::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == DecisionSource::Fallback
    }
}
