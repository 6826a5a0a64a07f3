//! Self-evolving pool of prompt variants.
//!
//! Variants are selected with the same UCB1 tracker used for actions. Every
//! `evolve_every_games` completed games the pool runs an evolution cycle:
//!
//! 1. Variants with at least `min_samples_for_culling` pulls are ranked by mean
//!    reward. Variants below the threshold, and the current best, are exempt.
//! 2. The worst eligible variants, up to `replacement_quota`, are marked.
//! 3. For each marked slot the generator rewrites the best variant's text.
//! 4. A successful rewrite replaces the marked variant in place with a fresh
//!    zero-pull stat; a failed one leaves the slot untouched.
//!
//! Planning and committing are separate so callers holding the pool behind a
//! lock can run generation without it. Pool size never changes across a cycle.

use futures::future::join_all;
use std::collections::HashSet;
use std::time::Duration;

use super::stat_tracker::StatTracker;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    PromptPoolConfig, PromptPoolSnapshot, PromptVariant, VariantId, VariantStat,
};
use crate::domain::ports::{GenerationError, VariantGenerator};

/// Slots chosen for replacement in one evolution cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct EvolutionPlan {
    pub seed_id: VariantId,
    pub seed_text: String,
    pub seed_generation: u32,
    /// Variants to replace, worst first.
    pub cull: Vec<VariantId>,
}

/// What one evolution cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvolutionReport {
    /// `(culled, replacement)` pairs.
    pub replaced: Vec<(VariantId, VariantId)>,
    /// Slots left untouched, with the reason.
    pub aborted: Vec<(VariantId, String)>,
    pub pool_size: usize,
}

impl EvolutionReport {
    pub fn is_noop(&self) -> bool {
        self.replaced.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PromptPool {
    config: PromptPoolConfig,
    variants: Vec<PromptVariant>,
    stats: StatTracker<VariantId>,
}

impl PromptPool {
    /// Build a fresh pool from seed texts.
    pub fn seed(
        config: PromptPoolConfig,
        exploration_constant: f64,
        seeds: Vec<String>,
    ) -> DomainResult<Self> {
        if config.min_pool_size == 0 {
            return Err(DomainError::InvalidConfiguration(
                "min_pool_size must be at least 1".to_string(),
            ));
        }
        if seeds.len() < config.min_pool_size {
            return Err(DomainError::InvalidConfiguration(format!(
                "{} seed variants supplied but min_pool_size is {}",
                seeds.len(),
                config.min_pool_size
            )));
        }
        if seeds.iter().any(|text| text.trim().is_empty()) {
            return Err(DomainError::InvalidConfiguration(
                "seed variants must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = seeds.iter().position(|text| !seen.insert(text.trim())) {
            return Err(DomainError::InvalidConfiguration(format!(
                "seed variant {duplicate} repeats an earlier seed"
            )));
        }

        let mut stats = StatTracker::new(exploration_constant);
        let variants: Vec<PromptVariant> = seeds.into_iter().map(PromptVariant::seed).collect();
        for variant in &variants {
            stats.register(variant.id.clone());
        }
        Ok(Self {
            config,
            variants,
            stats,
        })
    }

    /// Rebuild a pool from a snapshot. Every variant must carry exactly one stat.
    pub fn restore(
        config: PromptPoolConfig,
        exploration_constant: f64,
        snapshot: PromptPoolSnapshot,
    ) -> DomainResult<Self> {
        let stats = StatTracker::restore(exploration_constant, snapshot.stats)?;
        let ids: HashSet<&VariantId> = snapshot.variants.iter().map(|v| &v.id).collect();

        if ids.len() != snapshot.variants.len() {
            return Err(DomainError::InvariantViolation(
                "prompt pool snapshot contains duplicate variant ids".to_string(),
            ));
        }
        if stats.len() != snapshot.variants.len() || stats.iter().any(|s| !ids.contains(&s.key)) {
            return Err(DomainError::InvariantViolation(
                "prompt pool snapshot stats do not match its variants".to_string(),
            ));
        }
        if snapshot.variants.len() < config.min_pool_size.max(1) {
            return Err(DomainError::InvariantViolation(format!(
                "prompt pool snapshot holds {} variants, below the floor of {}",
                snapshot.variants.len(),
                config.min_pool_size.max(1)
            )));
        }

        Ok(Self {
            config,
            variants: snapshot.variants,
            stats,
        })
    }

    pub fn config(&self) -> &PromptPoolConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Variants in pool order.
    pub fn variants(&self) -> &[PromptVariant] {
        &self.variants
    }

    pub fn get(&self, id: &VariantId) -> Option<&PromptVariant> {
        self.variants.iter().find(|variant| &variant.id == id)
    }

    pub fn stat(&self, id: &VariantId) -> Option<&VariantStat> {
        self.stats.get(id)
    }

    fn ids(&self) -> Vec<VariantId> {
        self.variants.iter().map(|variant| variant.id.clone()).collect()
    }

    /// The variant to use next, chosen by UCB1 over the pool.
    pub fn active_variant(&self) -> DomainResult<&PromptVariant> {
        let ids = self.ids();
        let total = self.stats.pulls_in_scope(&ids);
        let chosen = self.stats.select(&ids, total).map_err(|_| {
            DomainError::InvariantViolation("prompt pool is empty".to_string())
        })?;
        self.get(&chosen)
            .ok_or_else(|| DomainError::VariantNotFound(chosen.to_string()))
    }

    /// Credit `reward` to a variant.
    pub fn record_result(&mut self, id: &VariantId, reward: f64) -> DomainResult<()> {
        if self.get(id).is_none() {
            return Err(DomainError::VariantNotFound(id.to_string()));
        }
        self.stats.update(id, reward);
        Ok(())
    }

    /// Best variant by mean reward; the first variant when none has been tried.
    pub fn best_variant(&self) -> DomainResult<&PromptVariant> {
        let ids = self.ids();
        match self.stats.best(&ids) {
            Some(best) => self
                .get(&best)
                .ok_or_else(|| DomainError::VariantNotFound(best.to_string())),
            None => self.variants.first().ok_or_else(|| {
                DomainError::InvariantViolation("prompt pool is empty".to_string())
            }),
        }
    }

    /// One line per variant, in pool order.
    pub fn performance_notes(&self) -> String {
        self.variants
            .iter()
            .map(|variant| {
                let (mean, pulls) = self
                    .stats
                    .get(&variant.id)
                    .map_or((0.0, 0), |stat| (stat.mean_reward(), stat.pull_count));
                format!(
                    "variant {} (generation {}): mean reward {:.2} over {} pulls",
                    variant.id, variant.generation, mean, pulls
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Decide what an evolution cycle would replace.
    ///
    /// Returns `None` when the trigger has not fired or no variant has been
    /// tried yet. A plan with an empty `cull` list means the cycle fired but
    /// nothing is eligible.
    pub fn plan_evolution(&self, games_since_last_evolution: u32) -> Option<EvolutionPlan> {
        if games_since_last_evolution < self.config.evolve_every_games.max(1) {
            return None;
        }

        let ids = self.ids();
        let best_id = self.stats.best(&ids)?;
        let seed = self.get(&best_id)?;

        let threshold = self.config.min_samples_for_culling.max(1);
        let mut eligible: Vec<(usize, &VariantStat)> = self
            .variants
            .iter()
            .enumerate()
            .filter(|(_, variant)| variant.id != best_id)
            .filter_map(|(position, variant)| {
                self.stats.get(&variant.id).map(|stat| (position, stat))
            })
            .filter(|(_, stat)| stat.pull_count >= threshold)
            .collect();

        eligible.sort_by(|(pos_a, a), (pos_b, b)| {
            a.mean_reward()
                .total_cmp(&b.mean_reward())
                .then_with(|| b.pull_count.cmp(&a.pull_count))
                .then_with(|| pos_a.cmp(pos_b))
        });

        let cull = eligible
            .into_iter()
            .take(self.config.replacement_quota)
            .map(|(_, stat)| stat.key.clone())
            .collect();

        Some(EvolutionPlan {
            seed_id: seed.id.clone(),
            seed_text: seed.text.clone(),
            seed_generation: seed.generation,
            cull,
        })
    }

    /// Normalize generated text, or explain why it cannot enter the pool.
    fn vet_candidate(&self, text: &str, accepted: &HashSet<String>) -> Result<String, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(GenerationError::Empty.to_string());
        }
        let length = trimmed.chars().count();
        if length < self.config.min_variant_chars {
            return Err(format!(
                "variant has {length} characters, fewer than {}",
                self.config.min_variant_chars
            ));
        }
        let vetted: String = trimmed.chars().take(self.config.max_variant_chars).collect();
        if accepted.contains(&vetted) || self.variants.iter().any(|v| v.text == vetted) {
            return Err("variant duplicates an existing prompt".to_string());
        }
        Ok(vetted)
    }

    /// Apply generation results to a plan.
    ///
    /// Each slot is independent: a failed generation, a rejected text, or a
    /// variant that disappeared since planning leaves that slot as it is.
    pub fn commit_evolution(
        &mut self,
        plan: &EvolutionPlan,
        results: Vec<Result<String, GenerationError>>,
    ) -> DomainResult<EvolutionReport> {
        let size_before = self.variants.len();
        let mut report = EvolutionReport::default();
        let mut accepted = HashSet::new();

        for (culled_id, result) in plan.cull.iter().zip(results) {
            let text = match result {
                Ok(text) => text,
                Err(err) => {
                    report.aborted.push((culled_id.clone(), err.to_string()));
                    continue;
                }
            };
            let Some(position) = self.variants.iter().position(|v| &v.id == culled_id) else {
                report
                    .aborted
                    .push((culled_id.clone(), "variant left the pool".to_string()));
                continue;
            };
            let vetted = match self.vet_candidate(&text, &accepted) {
                Ok(vetted) => vetted,
                Err(reason) => {
                    report.aborted.push((culled_id.clone(), reason));
                    continue;
                }
            };

            let child = PromptVariant {
                generation: plan.seed_generation + 1,
                parent_id: Some(plan.seed_id.clone()),
                ..PromptVariant::seed(vetted.clone())
            };
            self.stats.remove(culled_id);
            self.stats.register(child.id.clone());
            report.replaced.push((culled_id.clone(), child.id.clone()));
            self.variants[position] = child;
            accepted.insert(vetted);
        }

        if self.variants.len() != size_before || self.stats.len() != self.variants.len() {
            return Err(DomainError::InvariantViolation(format!(
                "evolution changed pool shape: {size_before} variants before, {} after, {} stats",
                self.variants.len(),
                self.stats.len()
            )));
        }

        report.pool_size = self.variants.len();
        for (culled, reason) in &report.aborted {
            tracing::warn!(variant = %culled, reason = %reason, "evolution slot aborted");
        }
        Ok(report)
    }

    /// Run a full cycle when the trigger fires. Intended for single-owner use;
    /// shared agents call [`Self::plan_evolution`], [`generate_for_plan`], and
    /// [`Self::commit_evolution`] separately.
    pub async fn maybe_evolve(
        &mut self,
        generator: &dyn VariantGenerator,
        games_since_last_evolution: u32,
        performance_notes: &str,
    ) -> DomainResult<Option<EvolutionReport>> {
        let Some(plan) = self.plan_evolution(games_since_last_evolution) else {
            return Ok(None);
        };
        let timeout = Duration::from_secs(self.config.generation_timeout_secs);
        let results = generate_for_plan(&plan, generator, performance_notes, timeout).await;
        self.commit_evolution(&plan, results).map(Some)
    }

    pub fn snapshot(&self) -> PromptPoolSnapshot {
        PromptPoolSnapshot {
            variants: self.variants.clone(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Ask the generator for one variant per planned slot, each under `timeout`.
pub async fn generate_for_plan(
    plan: &EvolutionPlan,
    generator: &dyn VariantGenerator,
    performance_notes: &str,
    timeout: Duration,
) -> Vec<Result<String, GenerationError>> {
    let calls = plan.cull.iter().map(|_| async {
        match tokio::time::timeout(
            timeout,
            generator.generate_variant(&plan.seed_text, performance_notes),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout),
        }
    });
    join_all(calls).await
}
