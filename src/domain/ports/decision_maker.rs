//! Decision maker port: turns an assembled context into one validated move.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::{DecisionContext, StructuredAction};

/// Why a decision call produced no usable move.
#[derive(Debug, Clone, Error)]
pub enum DecisionError {
    #[error("Decision maker unavailable: {0}")]
    Unavailable(String),

    #[error("Decision maker rate limited")]
    RateLimited,

    #[error("Decision timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed decision: {reason}")]
    Malformed { reason: String, raw: String },
}

impl DecisionError {
    /// Transient failures fall back to the bandit; malformed replies may be retried first.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Malformed { .. })
    }

    pub fn malformed(reason: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            raw: raw.into(),
        }
    }
}

/// External collaborator that picks the in-game move.
#[async_trait]
pub trait DecisionMaker: Send + Sync {
    /// Implementation name for logs.
    fn name(&self) -> &'static str;

    /// Decide one move. Implementations validate their own output and return
    /// `Malformed` rather than an action outside `context.legal_actions`.
    async fn decide(&self, context: &DecisionContext) -> Result<StructuredAction, DecisionError>;
}
