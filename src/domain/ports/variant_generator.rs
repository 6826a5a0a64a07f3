//! Variant generator port: rewrites the best prompt into a new candidate.

use async_trait::async_trait;
use thiserror::Error;

/// Why a generation attempt produced no variant.
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Variant generator unavailable: {0}")]
    Unavailable(String),

    #[error("Variant generation timed out")]
    Timeout,

    #[error("Variant generator returned no text")]
    Empty,

    #[error("Generated variant rejected: {0}")]
    Rejected(String),
}

/// External collaborator that writes new prompt variants.
#[async_trait]
pub trait VariantGenerator: Send + Sync {
    /// Implementation name for logs.
    fn name(&self) -> &'static str;

    /// Produce new variant text from the current best prompt and performance notes.
    async fn generate_variant(
        &self,
        best_prompt: &str,
        performance_notes: &str,
    ) -> Result<String, GenerationError>;
}
