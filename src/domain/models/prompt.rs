//! Prompt variants: the instruction texts an agent evolves over time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a prompt variant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantId(String);

impl VariantId {
    pub fn generate() -> Self {
        Self(format!("pv-{}", Uuid::new_v4().simple()))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One instruction text in an agent's prompt pool.
///
/// Its reward statistics live in the pool's tracker under the same id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub id: VariantId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// 0 for seeds, parent generation + 1 for regenerated variants.
    pub generation: u32,
    pub parent_id: Option<VariantId>,
}

impl PromptVariant {
    pub fn seed(text: impl Into<String>) -> Self {
        Self {
            id: VariantId::generate(),
            text: text.into(),
            created_at: Utc::now(),
            generation: 0,
            parent_id: None,
        }
    }

    pub fn child_of(parent: &Self, text: impl Into<String>) -> Self {
        Self {
            id: VariantId::generate(),
            text: text.into(),
            created_at: Utc::now(),
            generation: parent.generation + 1,
            parent_id: Some(parent.id.clone()),
        }
    }
}
