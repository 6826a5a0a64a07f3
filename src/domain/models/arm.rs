//! Per-arm reward bookkeeping shared by action and prompt-variant bandits.

use serde::{Deserialize, Serialize};

use super::action::ActionKey;
use super::prompt::VariantId;

/// Pull count and cumulative reward for one bandit arm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmStat<K> {
    pub key: K,
    pub pull_count: u64,
    pub cumulative_reward: f64,
}

/// Statistics for one action category.
pub type ActionStat = ArmStat<ActionKey>;

/// Statistics for one prompt variant.
pub type VariantStat = ArmStat<VariantId>;

impl<K> ArmStat<K> {
    pub fn new(key: K) -> Self {
        Self {
            key,
            pull_count: 0,
            cumulative_reward: 0.0,
        }
    }

    /// Mean reward, zero for an arm that was never pulled.
    pub fn mean_reward(&self) -> f64 {
        self.cumulative_reward / self.pull_count.max(1) as f64
    }

    pub fn is_untried(&self) -> bool {
        self.pull_count == 0
    }

    pub(crate) fn record(&mut self, reward: f64) {
        self.pull_count += 1;
        self.cumulative_reward += reward;
    }
}
