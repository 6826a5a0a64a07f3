//! Persistence port for learned agent state.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentProfile, AgentSnapshot};

/// Stores and loads whole agent snapshots.
///
/// `save` followed by `load` must return a snapshot equal to the one saved.
#[async_trait]
pub trait AgentStateRepository: Send + Sync {
    async fn load(&self, agent_id: &str) -> DomainResult<Option<AgentSnapshot>>;

    /// Replace everything stored for `snapshot.profile.agent_id`.
    async fn save(&self, snapshot: &AgentSnapshot) -> DomainResult<()>;

    async fn list_agents(&self) -> DomainResult<Vec<AgentProfile>>;
}
