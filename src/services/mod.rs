pub mod agent;
pub mod battle_session;
pub mod circuit_breaker;
pub mod context_builder;
pub mod decision_gate;
pub mod episodic_memory;
pub mod prompt_pool;
pub mod reward_policy;
pub mod series_runner;
pub mod stat_tracker;

pub use agent::{Agent, Brain, Collaborators};
pub use battle_session::{
    AbortHandle, AbortSignal, BattleSession, BattleSummary, SessionPhase,
};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use context_builder::{action_summary, seed_prompts, DecisionContextBuilder, MAX_SEED_PROMPTS};
pub use decision_gate::{DecisionGate, GateDecision};
pub use episodic_memory::{state_hash, EpisodicMemory, NewEpisode};
pub use prompt_pool::{generate_for_plan, EvolutionPlan, EvolutionReport, PromptPool};
pub use reward_policy::RewardPolicy;
pub use series_runner::{SeriesMode, SeriesReport, SeriesRunner};
pub use stat_tracker::StatTracker;
