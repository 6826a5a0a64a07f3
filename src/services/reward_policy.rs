//! Reward shaping.
//!
//! Each turn earns `clamp(damage_dealt / damage_scale, 0, 1)`. That reward is
//! credited to the action taken and to the battle's prompt variant. When a
//! battle completes, the outcome score (win 1.0, draw 0.5, loss 0.0) is credited
//! to the variant as one extra pull. Aborted battles earn no terminal pull.

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{BattleOutcome, RewardConfig, TurnFeedback};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardPolicy {
    damage_scale: f64,
}

impl RewardPolicy {
    pub fn new(config: &RewardConfig) -> DomainResult<Self> {
        if !config.damage_scale.is_finite() || config.damage_scale <= 0.0 {
            return Err(DomainError::InvalidConfiguration(format!(
                "damage_scale must be positive and finite, got {}",
                config.damage_scale
            )));
        }
        Ok(Self {
            damage_scale: config.damage_scale,
        })
    }

    pub fn damage_scale(&self) -> f64 {
        self.damage_scale
    }

    pub fn turn_reward(&self, feedback: &TurnFeedback) -> f64 {
        (f64::from(feedback.damage_dealt) / self.damage_scale).clamp(0.0, 1.0)
    }

    pub fn terminal_reward(&self, outcome: BattleOutcome) -> f64 {
        outcome.score()
    }
}
