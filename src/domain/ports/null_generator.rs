//! Null variant generator implementation.
//!
//! Used when prompt evolution is disabled: every generation attempt fails, so
//! evolution cycles abort their slots and the pool stays as seeded.

use async_trait::async_trait;

use super::variant_generator::{GenerationError, VariantGenerator};

/// A generator that never produces a variant.
#[derive(Debug, Clone, Default)]
pub struct NullVariantGenerator;

impl NullVariantGenerator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VariantGenerator for NullVariantGenerator {
    fn name(&self) -> &'static str {
        "null"
    }

    async fn generate_variant(
        &self,
        _best_prompt: &str,
        _performance_notes: &str,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::Unavailable(
            "variant generation disabled".to_string(),
        ))
    }
}
