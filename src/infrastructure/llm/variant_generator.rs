//! Prompt variant generation backed by the Messages API.

use async_trait::async_trait;
use regex::Regex;
use std::sync::Arc;

use super::client::AnthropicClient;
use crate::domain::models::{AgentProfile, LlmConfig, PromptPoolConfig};
use crate::domain::ports::{GenerationError, VariantGenerator};
use crate::infrastructure::validators::ContentGuard;

/// The current best prompt is quoted up to this many characters.
const MAX_QUOTED_PROMPT_CHARS: usize = 1200;

const GENERATOR_SYSTEM_PROMPT: &str =
    "Return only the variant prompt in the requested format. No preamble.";

/// Rewrites the best-performing prompt into one new candidate.
#[derive(Debug)]
pub struct LlmVariantGenerator {
    client: Arc<AnthropicClient>,
    profile: AgentProfile,
    guard: ContentGuard,
    variant_tag: Regex,
    max_tokens: u32,
    temperature: f32,
    min_chars: usize,
    max_chars: usize,
}

impl LlmVariantGenerator {
    pub fn new(
        client: Arc<AnthropicClient>,
        profile: AgentProfile,
        llm: &LlmConfig,
        pool: &PromptPoolConfig,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            profile,
            guard: ContentGuard::new()?,
            variant_tag: Regex::new(r"(?s)<VARIANT>(.*?)</VARIANT>")?,
            max_tokens: llm.variant_max_tokens,
            temperature: llm.variant_temperature,
            min_chars: pool.min_variant_chars,
            max_chars: pool.max_variant_chars,
        })
    }

    fn meta_prompt(&self, best_prompt: &str, performance_notes: &str) -> String {
        let quoted: String = best_prompt.chars().take(MAX_QUOTED_PROMPT_CHARS).collect();
        format!(
            "You are an expert at writing AI agent system prompts for RPG combat games.\n\n\
             Current prompt for {name} (a {class}):\n\
             <CURRENT_PROMPT>\n{quoted}\n</CURRENT_PROMPT>\n\n\
             Performance so far:\n{performance_notes}\n\n\
             Write one improved variant. It must:\n\
             - Keep the name ({name}) and class ({class})\n\
             - Sound like a real person under pressure, not a game bot\n\
             - Try a different strategic emphasis or emotional angle\n\
             - Stay under 600 words\n\
             - End with: ACTION: <action_name>\n\n\
             Return it like this:\n\
             <VARIANT>\n...prompt...\n</VARIANT>",
            name = self.profile.name,
            class = self.profile.class,
        )
    }

    /// Pull the variant out of the reply and screen it.
    fn extract(&self, reply: &str) -> Result<String, GenerationError> {
        let body = self
            .variant_tag
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .map_or(reply, |m| m.as_str())
            .trim();
        if body.is_empty() {
            return Err(GenerationError::Empty);
        }

        let screened = self
            .guard
            .sanitize(body, self.max_chars)
            .map_err(|e| GenerationError::Rejected(e.to_string()))?;
        if screened.chars().count() < self.min_chars {
            return Err(GenerationError::Rejected(format!(
                "variant has {} characters, at least {} required",
                screened.chars().count(),
                self.min_chars
            )));
        }
        Ok(screened)
    }
}

#[async_trait]
impl VariantGenerator for LlmVariantGenerator {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate_variant(
        &self,
        best_prompt: &str,
        performance_notes: &str,
    ) -> Result<String, GenerationError> {
        let reply = self
            .client
            .complete(
                GENERATOR_SYSTEM_PROMPT,
                &self.meta_prompt(best_prompt, performance_notes),
                self.max_tokens,
                self.temperature,
            )
            .await
            .map_err(|err| GenerationError::Unavailable(err.to_string()))?;

        self.extract(&reply)
    }
}
