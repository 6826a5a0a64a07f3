//! Tactician - adaptive decision engine for turn-based agents
//!
//! Agents pick actions with a UCB1 bandit, evolve their own system prompts from
//! observed rewards, and recall similar past situations through hashed state
//! embeddings.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): bandits, prompt pool, memory and battle orchestration
//! - **Adapters** (`adapters`): SQLite persistence
//! - **Infrastructure Layer** (`infrastructure`): config, logging, LLM adapters, embeddings
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tactician::{Agent, AgentProfile, Collaborators, Config};
//!
//! let agent = Agent::new(AgentProfile::new("kael-1", "Kael", "mage"), Config::default(), collaborators)?;
//! let summary = agent.run_battle(&mut environment, &AbortSignal::never()).await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::models::{
    ActionKey, AgentProfile, AgentSnapshot, BattleOutcome, BattleState, Config, DecisionContext,
    StructuredAction, TurnFeedback, TurnObservation,
};
pub use domain::ports::{
    AgentStateRepository, BattleEnvironment, DecisionMaker, StateEmbedder, VariantGenerator,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    AbortHandle, AbortSignal, Agent, BattleSummary, Collaborators, PromptPool, SeriesMode,
    SeriesRunner, StatTracker,
};
