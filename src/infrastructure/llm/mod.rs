//! Messages API adapters for the decision and variant-generation ports.

pub mod client;
pub mod decision_maker;
pub mod errors;
pub mod types;
pub mod variant_generator;

pub use client::{AnthropicClient, AnthropicClientConfig};
pub use decision_maker::LlmDecisionMaker;
pub use errors::LlmError;
pub use types::{ContentBlock, Message, MessageRequest, MessageResponse, Usage};
pub use variant_generator::LlmVariantGenerator;
