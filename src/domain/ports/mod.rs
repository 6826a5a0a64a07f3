//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines the interfaces the decision engine depends on:
//! - DecisionMaker: picks the in-game move from an assembled context
//! - VariantGenerator: writes new prompt variants
//! - StateEmbedder: deterministic state vectors for recall
//! - AgentStateRepository: snapshot persistence
//! - BattleEnvironment: the external game engine
//!
//! Infrastructure adapters implement these so services stay independent of
//! HTTP, SQL, and game rules.

pub mod battle_environment;
pub mod decision_maker;
pub mod embedding;
pub mod in_memory_state;
pub mod null_generator;
pub mod state_repository;
pub mod variant_generator;

pub use battle_environment::BattleEnvironment;
pub use decision_maker::{DecisionError, DecisionMaker};
pub use embedding::StateEmbedder;
pub use in_memory_state::InMemoryStateRepository;
pub use null_generator::NullVariantGenerator;
pub use state_repository::AgentStateRepository;
pub use variant_generator::{GenerationError, VariantGenerator};
