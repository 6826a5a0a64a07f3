//! Battle environment port: the external game engine as seen by one agent.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{BattleOutcome, StructuredAction, TurnFeedback, TurnObservation};

/// One battle in progress.
#[async_trait]
pub trait BattleEnvironment: Send {
    /// The next turn for the agent, or `None` once the battle is over.
    async fn next_turn(&mut self) -> DomainResult<Option<TurnObservation>>;

    /// Execute the agent's move and report what happened.
    async fn apply(&mut self, action: &StructuredAction) -> DomainResult<TurnFeedback>;

    /// Final result, available once `next_turn` has returned `None`.
    fn outcome(&self) -> Option<BattleOutcome>;

    /// Short recap of recent turns, fed into prompt regeneration notes.
    fn recap(&self) -> String;
}
