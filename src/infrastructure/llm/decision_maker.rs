//! Decision maker backed by the Messages API.

use async_trait::async_trait;
use std::sync::Arc;

use super::client::AnthropicClient;
use super::errors::LlmError;
use crate::domain::models::{AgentConfig, DecisionContext, LlmConfig, StructuredAction};
use crate::domain::ports::{DecisionError, DecisionMaker};
use crate::infrastructure::validators::ActionOutputValidator;

/// Asks the model for one move and validates the reply.
///
/// The selected prompt variant is the system prompt; the rendered context
/// (situation, memory hints, action data, legal actions) is the user turn.
#[derive(Debug)]
pub struct LlmDecisionMaker {
    client: Arc<AnthropicClient>,
    validator: ActionOutputValidator,
    max_tokens: u32,
    temperature: f32,
}

impl LlmDecisionMaker {
    pub fn new(
        client: Arc<AnthropicClient>,
        llm: &LlmConfig,
        agent: &AgentConfig,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            validator: ActionOutputValidator::new(agent.max_narration_chars)?,
            max_tokens: llm.decision_max_tokens,
            temperature: llm.decision_temperature,
        })
    }

    fn map_error(&self, err: LlmError) -> DecisionError {
        match err {
            LlmError::RateLimitExceeded => DecisionError::RateLimited,
            LlmError::Timeout => DecisionError::Timeout(self.client.request_timeout()),
            other => DecisionError::Unavailable(other.to_string()),
        }
    }
}

#[async_trait]
impl DecisionMaker for LlmDecisionMaker {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn decide(&self, context: &DecisionContext) -> Result<StructuredAction, DecisionError> {
        let raw = self
            .client
            .complete(
                &context.system_prompt,
                &context.user_message(),
                self.max_tokens,
                self.temperature,
            )
            .await
            .map_err(|err| self.map_error(err))?;

        let parsed = self
            .validator
            .parse(&raw, &context.legal_actions, &context.agent_name)
            .map_err(|err| DecisionError::malformed(err.to_string(), raw.clone()))?;

        Ok(StructuredAction::from_model(parsed.action, parsed.narration))
    }
}
