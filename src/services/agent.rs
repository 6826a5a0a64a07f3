//! The agent: one profile plus the learned state shared by all its battles.
//!
//! All mutable learning state lives in [`Brain`] behind a single async mutex.
//! Battles take the lock only to read or update it and release it before any
//! collaborator call.

use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use super::context_builder::{seed_prompts, DecisionContextBuilder};
use super::decision_gate::DecisionGate;
use super::episodic_memory::EpisodicMemory;
use super::prompt_pool::PromptPool;
use super::reward_policy::RewardPolicy;
use super::stat_tracker::StatTracker;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionKey, AgentProfile, AgentSnapshot, BattleRecord, Config, OpponentModel,
};
use crate::domain::ports::{DecisionMaker, StateEmbedder, VariantGenerator};

/// Learned state of one agent.
#[derive(Debug)]
pub struct Brain {
    pub(crate) actions: StatTracker<ActionKey>,
    pub(crate) pool: PromptPool,
    pub(crate) memory: EpisodicMemory,
    pub(crate) record: BattleRecord,
    pub(crate) opponents: OpponentModel,
    pub(crate) games_since_evolution: u32,
}

impl Brain {
    pub fn actions(&self) -> &StatTracker<ActionKey> {
        &self.actions
    }

    pub fn pool(&self) -> &PromptPool {
        &self.pool
    }

    pub fn memory(&self) -> &EpisodicMemory {
        &self.memory
    }

    pub fn record(&self) -> &BattleRecord {
        &self.record
    }

    pub fn opponents(&self) -> &OpponentModel {
        &self.opponents
    }

    pub fn games_since_evolution(&self) -> u32 {
        self.games_since_evolution
    }
}

/// Collaborators an agent talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn StateEmbedder>,
    pub decision_maker: Arc<dyn DecisionMaker>,
    pub variant_generator: Arc<dyn VariantGenerator>,
}

pub struct Agent {
    pub(crate) profile: AgentProfile,
    pub(crate) config: Config,
    pub(crate) brain: Mutex<Brain>,
    pub(crate) builder: DecisionContextBuilder,
    pub(crate) decision_maker: Arc<dyn DecisionMaker>,
    pub(crate) variant_generator: Arc<dyn VariantGenerator>,
    pub(crate) gate: DecisionGate,
    pub(crate) rewards: RewardPolicy,
}

impl Agent {
    /// A fresh agent with a seeded prompt pool and empty statistics.
    pub fn new(
        profile: AgentProfile,
        config: Config,
        collaborators: Collaborators,
    ) -> DomainResult<Self> {
        let actions = StatTracker::new(config.bandit.exploration_constant);
        let record = BattleRecord::default();
        let seed_count = config
            .prompt_pool
            .seed_variants
            .max(config.prompt_pool.min_pool_size);
        let seeds = seed_prompts(&profile, &record, &actions, seed_count);
        let pool = PromptPool::seed(
            config.prompt_pool.clone(),
            config.bandit.exploration_constant,
            seeds,
        )?;
        let memory = EpisodicMemory::new(collaborators.embedder.clone(), &config.memory);

        tracing::info!(
            agent_id = %profile.agent_id,
            variants = pool.len(),
            "created agent with seeded prompt pool"
        );

        Self::assemble(
            profile,
            config,
            collaborators,
            Brain {
                actions,
                pool,
                memory,
                record,
                opponents: OpponentModel::default(),
                games_since_evolution: 0,
            },
        )
    }

    /// Rebuild an agent from persisted state.
    pub fn from_snapshot(
        snapshot: AgentSnapshot,
        config: Config,
        collaborators: Collaborators,
    ) -> DomainResult<Self> {
        let exploration = config.bandit.exploration_constant;
        let actions = StatTracker::restore(exploration, snapshot.action_stats)?;
        let pool = PromptPool::restore(config.prompt_pool.clone(), exploration, snapshot.prompt_pool)?;
        let memory = EpisodicMemory::restore(
            collaborators.embedder.clone(),
            &config.memory,
            snapshot.memory,
        )?;

        tracing::info!(
            agent_id = %snapshot.profile.agent_id,
            games = snapshot.record.games(),
            variants = pool.len(),
            episodes = memory.len(),
            "restored agent from snapshot"
        );

        Self::assemble(
            snapshot.profile,
            config,
            collaborators,
            Brain {
                actions,
                pool,
                memory,
                record: snapshot.record,
                opponents: snapshot.opponents,
                games_since_evolution: snapshot.games_since_evolution,
            },
        )
    }

    fn assemble(
        profile: AgentProfile,
        config: Config,
        collaborators: Collaborators,
        brain: Brain,
    ) -> DomainResult<Self> {
        if !config.bandit.exploration_constant.is_finite()
            || config.bandit.exploration_constant < 0.0
        {
            return Err(DomainError::InvalidConfiguration(format!(
                "exploration_constant must be finite and non-negative, got {}",
                config.bandit.exploration_constant
            )));
        }
        let gate = DecisionGate::new(&config.rate_limit, &config.circuit_breaker)?;
        let rewards = RewardPolicy::new(&config.reward)?;
        Ok(Self {
            builder: DecisionContextBuilder::new(&profile),
            profile,
            config,
            brain: Mutex::new(brain),
            decision_maker: collaborators.decision_maker,
            variant_generator: collaborators.variant_generator,
            gate,
            rewards,
        })
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gate(&self) -> &DecisionGate {
        &self.gate
    }

    /// Lock the learned state for inspection.
    pub async fn brain(&self) -> MutexGuard<'_, Brain> {
        self.brain.lock().await
    }

    pub async fn snapshot(&self) -> AgentSnapshot {
        let brain = self.brain.lock().await;
        AgentSnapshot {
            profile: self.profile.clone(),
            record: brain.record.clone(),
            games_since_evolution: brain.games_since_evolution,
            action_stats: brain.actions.snapshot(),
            prompt_pool: brain.pool.snapshot(),
            memory: brain.memory.snapshot(),
            opponents: brain.opponents.clone(),
            saved_at: chrono::Utc::now(),
        }
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("profile", &self.profile)
            .field("decision_maker", &self.decision_maker.name())
            .field("variant_generator", &self.variant_generator.name())
            .finish_non_exhaustive()
    }
}
