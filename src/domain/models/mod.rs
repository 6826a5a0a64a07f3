pub mod action;
pub mod arm;
pub mod battle;
pub mod config;
pub mod decision;
pub mod episode;
pub mod profile;
pub mod prompt;
pub mod snapshot;

pub use action::{standard_actions, ActionKey, DecisionSource, StructuredAction, STANDARD_ACTIONS};
pub use arm::{ActionStat, ArmStat, VariantStat};
pub use battle::{
    BattleOutcome, BattleState, CanonicalState, Combatant, HealthBand, TurnFeedback,
    TurnObservation,
};
pub use config::{
    AgentConfig, BanditConfig, CircuitBreakerSettings, Config, DatabaseConfig, LlmConfig,
    LoggingConfig, MemoryConfig, PromptPoolConfig, RateLimitConfig, RewardConfig,
};
pub use decision::DecisionContext;
pub use episode::{Episode, RetrievedEpisode};
pub use profile::{AgentProfile, BattleRecord, OpponentModel};
pub use prompt::{PromptVariant, VariantId};
pub use snapshot::{AgentSnapshot, MemorySnapshot, PromptPoolSnapshot};
