//! UCB1 bandit bookkeeping.
//!
//! A `StatTracker` owns one [`ArmStat`] per arm and answers two questions:
//! which arm to try next (`select`, UCB1 with cold-start exploration) and which
//! arm has done best so far (`best`, argmax of mean reward). It is used both for
//! action categories and for prompt variants.

use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::ArmStat;

/// Per-arm pull counts and rewards, in stable insertion order.
#[derive(Debug, Clone)]
pub struct StatTracker<K> {
    exploration_constant: f64,
    arms: Vec<ArmStat<K>>,
    index: HashMap<K, usize>,
}

impl<K> StatTracker<K>
where
    K: Clone + Eq + Hash + Display,
{
    pub fn new(exploration_constant: f64) -> Self {
        Self {
            exploration_constant,
            arms: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Rebuild a tracker from stats in their original insertion order.
    pub fn restore(exploration_constant: f64, stats: Vec<ArmStat<K>>) -> DomainResult<Self> {
        let mut tracker = Self::new(exploration_constant);
        for stat in stats {
            if !stat.cumulative_reward.is_finite() {
                return Err(DomainError::InvariantViolation(format!(
                    "arm {} has non-finite cumulative reward",
                    stat.key
                )));
            }
            if tracker.index.contains_key(&stat.key) {
                return Err(DomainError::InvariantViolation(format!(
                    "arm {} appears twice",
                    stat.key
                )));
            }
            tracker.index.insert(stat.key.clone(), tracker.arms.len());
            tracker.arms.push(stat);
        }
        Ok(tracker)
    }

    pub fn exploration_constant(&self) -> f64 {
        self.exploration_constant
    }

    pub fn len(&self) -> usize {
        self.arms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arms.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&ArmStat<K>> {
        self.index.get(key).map(|&slot| &self.arms[slot])
    }

    /// Arms in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ArmStat<K>> {
        self.arms.iter()
    }

    /// Ensure `key` has a stat entry. Returns `true` if it was created.
    pub fn register(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key.clone(), self.arms.len());
        self.arms.push(ArmStat::new(key));
        true
    }

    /// Record one pull of `key`, creating its entry on first use.
    ///
    /// Any finite reward is accepted; range policy belongs to the caller.
    pub fn update(&mut self, key: &K, reward: f64) {
        assert!(
            reward.is_finite(),
            "non-finite reward {reward} recorded for arm {key}"
        );
        self.register(key.clone());
        let slot = self.index[key];
        self.arms[slot].record(reward);
    }

    /// Drop an arm and its statistics.
    pub fn remove(&mut self, key: &K) -> Option<ArmStat<K>> {
        let slot = self.index.remove(key)?;
        let removed = self.arms.remove(slot);
        for position in self.index.values_mut() {
            if *position > slot {
                *position -= 1;
            }
        }
        Some(removed)
    }

    /// Total pulls across `candidates`; the natural `N` for [`Self::select`].
    pub fn pulls_in_scope(&self, candidates: &[K]) -> u64 {
        let mut seen = std::collections::HashSet::new();
        candidates
            .iter()
            .filter(|key| seen.insert(*key))
            .filter_map(|key| self.get(key))
            .map(|stat| stat.pull_count)
            .sum()
    }

    /// UCB1 score of `key` given `total_pulls` in scope. Untried arms score +∞.
    pub fn ucb_score(&self, key: &K, total_pulls: u64) -> f64 {
        match self.get(key) {
            Some(stat) if stat.pull_count > 0 => {
                let ln_total = (total_pulls.max(1) as f64).ln();
                let bonus = (ln_total / stat.pull_count as f64).sqrt();
                self.exploration_constant.mul_add(bonus, stat.mean_reward())
            }
            _ => f64::INFINITY,
        }
    }

    /// Pick the next arm to try among `candidates`.
    ///
    /// Untried candidates always win. Ties go to the arm with fewer pulls, then
    /// to the arm registered first; candidates the tracker has never seen rank
    /// after all registered arms, in the order given.
    pub fn select(&self, candidates: &[K], total_pulls_in_scope: u64) -> DomainResult<K> {
        let tracker_len = self.arms.len();
        let mut chosen: Option<(&K, f64, u64, usize)> = None;

        for (position, key) in candidates.iter().enumerate() {
            let score = self.ucb_score(key, total_pulls_in_scope);
            let (pulls, order) = match self.index.get(key) {
                Some(&slot) => (self.arms[slot].pull_count, slot),
                None => (0, tracker_len + position),
            };

            let better = match chosen {
                None => true,
                Some((_, best_score, best_pulls, best_order)) => score
                    .total_cmp(&best_score)
                    .then_with(|| best_pulls.cmp(&pulls))
                    .then_with(|| best_order.cmp(&order))
                    .is_gt(),
            };
            if better {
                chosen = Some((key, score, pulls, order));
            }
        }

        let (key, score, pulls, _) = chosen.ok_or(DomainError::NoCandidateActions)?;
        tracing::debug!(
            arm = %key,
            score,
            pulls,
            total_pulls = total_pulls_in_scope,
            "ucb1 selection"
        );
        Ok(key.clone())
    }

    /// The tried candidate with the highest mean reward, if any was tried.
    ///
    /// Ties go to the arm registered first.
    pub fn best(&self, candidates: &[K]) -> Option<K> {
        candidates
            .iter()
            .filter_map(|key| self.index.get(key).map(|&slot| (slot, &self.arms[slot])))
            .filter(|(_, stat)| stat.pull_count > 0)
            .min_by(|(slot_a, a), (slot_b, b)| {
                b.mean_reward()
                    .total_cmp(&a.mean_reward())
                    .then_with(|| slot_a.cmp(slot_b))
            })
            .map(|(_, stat)| stat.key.clone())
    }

    /// Tried arms ordered by mean reward, best first.
    pub fn ranked(&self) -> Vec<&ArmStat<K>> {
        let mut tried: Vec<&ArmStat<K>> =
            self.arms.iter().filter(|stat| stat.pull_count > 0).collect();
        tried.sort_by(|a, b| b.mean_reward().total_cmp(&a.mean_reward()));
        tried
    }

    /// Stats in insertion order, for persistence.
    pub fn snapshot(&self) -> Vec<ArmStat<K>> {
        self.arms.clone()
    }
}
