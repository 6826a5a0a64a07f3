//! In-memory agent state repository for tests and ephemeral runs.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::state_repository::AgentStateRepository;
use crate::domain::errors::DomainResult;
use crate::domain::models::{AgentProfile, AgentSnapshot};

#[derive(Debug, Default)]
pub struct InMemoryStateRepository {
    snapshots: RwLock<BTreeMap<String, AgentSnapshot>>,
}

impl InMemoryStateRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStateRepository for InMemoryStateRepository {
    async fn load(&self, agent_id: &str) -> DomainResult<Option<AgentSnapshot>> {
        Ok(self.snapshots.read().await.get(agent_id).cloned())
    }

    async fn save(&self, snapshot: &AgentSnapshot) -> DomainResult<()> {
        self.snapshots
            .write()
            .await
            .insert(snapshot.profile.agent_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn list_agents(&self) -> DomainResult<Vec<AgentProfile>> {
        Ok(self
            .snapshots
            .read()
            .await
            .values()
            .map(|snapshot| snapshot.profile.clone())
            .collect())
    }
}
