//! HTTP client for the Anthropic Messages API.

use backoff::ExponentialBackoffBuilder;
use reqwest::Client as ReqwestClient;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::errors::LlmError;
use super::types::{MessageRequest, MessageResponse};
use crate::domain::models::LlmConfig;
use crate::infrastructure::logging::SecretScrubber;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Configuration for the Messages API client
#[derive(Clone)]
pub struct AnthropicClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt; transient errors only
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl AnthropicClientConfig {
    /// Resolve client settings, reading the key from `settings.api_key_env`.
    pub fn from_settings(settings: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = std::env::var(&settings.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| LlmError::MissingApiKey(settings.api_key_env.clone()))?;

        Ok(Self::with_key(settings, api_key))
    }

    pub fn with_key(settings: &LlmConfig, api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout_secs: settings.request_timeout_secs,
            max_retries: settings.max_retries,
            initial_backoff_ms: settings.initial_backoff_ms,
            max_backoff_ms: settings.max_backoff_ms,
        }
    }
}

impl std::fmt::Debug for AnthropicClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClientConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

/// Messages API client with bounded timeouts and exponential backoff
///
/// Rate limits (429), overload (529), server errors and network failures are
/// retried up to `max_retries` times; everything else fails immediately.
#[derive(Debug)]
pub struct AnthropicClient {
    http_client: ReqwestClient,
    config: AnthropicClientConfig,
    scrubber: SecretScrubber,
}

impl AnthropicClient {
    pub fn new(config: AnthropicClientConfig) -> Result<Self, LlmError> {
        let http_client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()?;
        let scrubber = SecretScrubber::new()
            .map_err(|e| LlmError::InvalidRequest(format!("secret scrubber: {e}")))?;

        Ok(Self {
            http_client,
            config,
            scrubber,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_secs)
    }

    /// Send a request, retrying transient failures.
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn send_message(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();

        let max_retries = self.config.max_retries;
        let mut attempt: u32 = 0;

        backoff::future::retry(policy, || {
            attempt += 1;
            let current = attempt;
            async move {
                self.send_once(request).await.map_err(|err| {
                    if err.is_transient() && current <= max_retries {
                        warn!(attempt = current, error = %err, "transient API error, retrying");
                        backoff::Error::transient(err)
                    } else {
                        backoff::Error::permanent(err)
                    }
                })
            }
        })
        .await
    }

    /// One system prompt plus one user message; returns the reply text.
    pub async fn complete(
        &self,
        system: &str,
        user: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, LlmError> {
        let request =
            MessageRequest::single_turn(&self.config.model, system, user, max_tokens, temperature);
        let response = self.send_message(&request).await?;
        debug!(
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            stop_reason = ?response.stop_reason,
            "message completed"
        );
        Ok(response.text())
    }

    async fn send_once(&self, request: &MessageRequest) -> Result<MessageResponse, LlmError> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(LlmError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            let body: String = self.scrubber.scrub(&body).chars().take(MAX_ERROR_BODY_CHARS).collect();
            return Err(LlmError::from_status(status, body));
        }

        let bytes = response.bytes().await.map_err(LlmError::from_reqwest)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
