//! Battle-facing types: the observed state, per-turn feedback, and final outcome.
//!
//! The game engine itself is external; these types are what it hands to an agent.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::action::ActionKey;

/// A state that can be reduced to a stable textual form for hashing and embedding.
///
/// `canonical_form` must be a pure function of the state: equal states produce
/// byte-identical output across runs and platforms.
pub trait CanonicalState {
    fn canonical_form(&self) -> String;

    /// Short natural-language description used in recalled-episode hints.
    fn summary(&self) -> String {
        let canonical = self.canonical_form();
        canonical.chars().take(200).collect()
    }
}

/// Coarse health reading used both for prompts and for similarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthBand {
    Strong,
    Bruised,
    Hurting,
    Critical,
}

impl HealthBand {
    pub fn from_fraction(fraction: f64) -> Self {
        if fraction > 0.78 {
            Self::Strong
        } else if fraction > 0.52 {
            Self::Bruised
        } else if fraction > 0.27 {
            Self::Hurting
        } else {
            Self::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strong => "strong",
            Self::Bruised => "bruised",
            Self::Hurting => "hurting",
            Self::Critical => "critical",
        }
    }

    /// How the agent feels about its own condition.
    pub fn self_feel(&self) -> &'static str {
        match self {
            Self::Strong => "Still strong. You have barely broken a sweat.",
            Self::Bruised => "Taken some hits. Manageable, but you feel every one.",
            Self::Hurting => "Hurting. Breathing costs something now.",
            Self::Critical => "One bad moment from the ground. Everything is urgent.",
        }
    }

    /// How the opponent looks from across the field.
    pub fn opponent_feel(&self, name: &str) -> String {
        match self {
            Self::Strong => format!("{name} looks untouched. Still fully dangerous."),
            Self::Bruised => format!("{name} is bleeding but holding it together."),
            Self::Hurting => format!("{name} is flagging. You can see it in the eyes."),
            Self::Critical => format!("{name} is almost done. Do not let up."),
        }
    }
}

/// One side of a duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combatant {
    pub name: String,
    pub class: String,
    pub hp: u32,
    pub max_hp: u32,
    #[serde(default)]
    pub mp: u32,
    #[serde(default)]
    pub max_mp: u32,
}

impl Combatant {
    pub fn health_fraction(&self) -> f64 {
        if self.max_hp == 0 {
            return 0.0;
        }
        f64::from(self.hp) / f64::from(self.max_hp)
    }

    pub fn health_band(&self) -> HealthBand {
        HealthBand::from_fraction(self.health_fraction())
    }
}

/// Snapshot of a battle at the start of the agent's turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleState {
    pub battle_id: String,
    pub round: u32,
    pub max_rounds: u32,
    pub environment: String,
    /// Stable identifier of the opponent across battles.
    pub opponent_id: String,
    pub me: Combatant,
    pub opponent: Combatant,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub recent_events: Vec<String>,
}

impl BattleState {
    /// Multi-line situation block rendered into the decision prompt.
    pub fn situation(&self) -> String {
        let items = if self.items.is_empty() {
            "nothing left in the bag".to_string()
        } else {
            self.items.join(", ")
        };
        let mut text = format!(
            "Setting: {}\nRound {}/{}\n\nYOU: {} MP: {}/{}. Carrying: {}.\nTHEM: {} Class: {}.",
            self.environment,
            self.round,
            self.max_rounds,
            self.me.health_band().self_feel(),
            self.me.mp,
            self.me.max_mp,
            items,
            self.opponent.health_band().opponent_feel(&self.opponent.name),
            self.opponent.class,
        );
        if !self.recent_events.is_empty() {
            text.push_str("\n\nRECENT:\n");
            text.push_str(&self.recent_events.join("\n"));
        }
        text
    }
}

impl CanonicalState for BattleState {
    // Bands lead so that similar spots share their highest-weighted tokens.
    fn canonical_form(&self) -> String {
        format!(
            "self {} opponent {} class {} env {} round {} of {} hp {} {} opp_hp {} {} mp {} items {}",
            self.me.health_band().as_str(),
            self.opponent.health_band().as_str(),
            self.opponent.class.to_lowercase(),
            self.environment.to_lowercase(),
            self.round,
            self.max_rounds,
            self.me.hp,
            self.me.max_hp,
            self.opponent.hp,
            self.opponent.max_hp,
            self.me.mp,
            self.items.len(),
        )
    }

    fn summary(&self) -> String {
        format!(
            "round {}/{} in {}: you {} ({}/{} hp), {} the {} {} ({}/{} hp)",
            self.round,
            self.max_rounds,
            self.environment,
            self.me.health_band().as_str(),
            self.me.hp,
            self.me.max_hp,
            self.opponent.name,
            self.opponent.class,
            self.opponent.health_band().as_str(),
            self.opponent.hp,
            self.opponent.max_hp,
        )
    }
}

impl CanonicalState for serde_json::Value {
    /// Flattens the value into sorted `path=value` pairs.
    fn canonical_form(&self) -> String {
        let mut pairs = BTreeMap::new();
        flatten_json("", self, &mut pairs);
        pairs
            .into_iter()
            .map(|(path, value)| format!("{path}={value}"))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn flatten_json(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{prefix}.{key}")
        }
    };
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                flatten_json(&join(key), child, out);
            }
        }
        serde_json::Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_json(&join(&index.to_string()), child, out);
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// What the engine reports after executing the agent's action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnFeedback {
    pub damage_dealt: u32,
    #[serde(default)]
    pub damage_taken: u32,
    /// The opponent's move this round, when the engine exposes it.
    #[serde(default)]
    pub opponent_action: Option<ActionKey>,
}

/// A battle turn offered to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnObservation {
    pub state: BattleState,
    pub legal_actions: Vec<ActionKey>,
}

/// Final result of a battle from the agent's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleOutcome {
    Won,
    Lost,
    Draw,
}

impl BattleOutcome {
    /// Win 1.0, draw 0.5, loss 0.0.
    pub fn score(&self) -> f64 {
        match self {
            Self::Won => 1.0,
            Self::Draw => 0.5,
            Self::Lost => 0.0,
        }
    }
}

impl fmt::Display for BattleOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Won => "won",
            Self::Lost => "lost",
            Self::Draw => "draw",
        };
        f.write_str(label)
    }
}
