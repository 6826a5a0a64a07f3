//! Per-battle decision loop.
//!
//! A session walks one battle through
//! `AwaitingTurn -> BuildingContext -> AwaitingDecision -> ApplyingReward -> AwaitingTurn`
//! until it is finished or aborted, both of which end in `Done`. Every call made
//! out of order is rejected with [`DomainError::InvalidStateTransition`].

use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

use super::agent::{Agent, Brain};
use super::episodic_memory::NewEpisode;
use super::prompt_pool::{generate_for_plan, EvolutionPlan, EvolutionReport};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    BattleOutcome, DecisionContext, StructuredAction, TurnFeedback, TurnObservation, VariantId,
};
use crate::domain::ports::{BattleEnvironment, DecisionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    AwaitingTurn,
    BuildingContext,
    AwaitingDecision,
    ApplyingReward,
    Done,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingTurn => "awaiting_turn",
            Self::BuildingContext => "building_context",
            Self::AwaitingDecision => "awaiting_decision",
            Self::ApplyingReward => "applying_reward",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiving side of a battle abort flag.
#[derive(Debug, Clone)]
pub struct AbortSignal(watch::Receiver<bool>);

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self(receiver)
    }

    pub fn is_aborted(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once the abort flag is raised.
    pub async fn cancelled(&self) {
        let mut receiver = self.0.clone();
        if receiver.wait_for(|aborted| *aborted).await.is_err() {
            // The handle is gone, so no abort can arrive.
            std::future::pending::<()>().await;
        }
    }
}

/// Sending side of a battle abort flag.
#[derive(Debug)]
pub struct AbortHandle(watch::Sender<bool>);

impl AbortHandle {
    pub fn new() -> (Self, AbortSignal) {
        let (sender, receiver) = watch::channel(false);
        (Self(sender), AbortSignal(receiver))
    }

    pub fn abort(&self) {
        self.0.send_replace(true);
    }
}

/// What happened in one battle.
#[derive(Debug, Clone, PartialEq)]
pub struct BattleSummary {
    pub battle_id: Option<String>,
    /// `None` when the battle was aborted.
    pub outcome: Option<BattleOutcome>,
    pub turns: u32,
    pub fallbacks: u32,
    pub malformed_replies: u32,
    pub variant_id: Option<VariantId>,
    pub evolution: Option<EvolutionReport>,
}

impl BattleSummary {
    pub fn aborted(&self) -> bool {
        self.outcome.is_none()
    }
}

/// One battle in progress for an agent.
pub struct BattleSession<'a> {
    agent: &'a Agent,
    phase: SessionPhase,
    battle_id: Option<String>,
    variant_id: Option<VariantId>,
    observation: Option<TurnObservation>,
    context: Option<DecisionContext>,
    pending: Option<StructuredAction>,
    turns: u32,
    fallbacks: u32,
    malformed_replies: u32,
}

impl Agent {
    pub fn start_battle(&self) -> BattleSession<'_> {
        BattleSession {
            agent: self,
            phase: SessionPhase::AwaitingTurn,
            battle_id: None,
            variant_id: None,
            observation: None,
            context: None,
            pending: None,
            turns: 0,
            fallbacks: 0,
            malformed_replies: 0,
        }
    }

    /// Play a battle to completion, or until `abort` fires.
    ///
    /// Environment errors end the battle early; rewards already applied stay recorded.
    pub async fn run_battle<E>(&self, env: &mut E, abort: &AbortSignal) -> DomainResult<BattleSummary>
    where
        E: BattleEnvironment + ?Sized,
    {
        let mut session = self.start_battle();
        loop {
            if abort.is_aborted() {
                session.abort();
                return Ok(session.summary(None, None));
            }
            let Some(observation) = env.next_turn().await? else {
                break;
            };
            session.begin_turn(observation).await?;

            let decided = tokio::select! {
                result = session.decide() => Some(result),
                () = abort.cancelled() => None,
            };
            let Some(action) = decided.transpose()? else {
                session.abort();
                return Ok(session.summary(None, None));
            };

            let feedback = env.apply(&action).await?;
            session.apply_reward(&feedback).await?;
        }

        if abort.is_aborted() {
            session.abort();
            return Ok(session.summary(None, None));
        }
        let outcome = env.outcome().ok_or_else(|| {
            DomainError::InvariantViolation("battle ended without an outcome".to_string())
        })?;
        session.finish(outcome, &env.recap(), abort).await
    }
}

impl BattleSession<'_> {
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Variant used for this battle, fixed at the first built context.
    pub fn variant_id(&self) -> Option<&VariantId> {
        self.variant_id.as_ref()
    }

    pub fn context(&self) -> Option<&DecisionContext> {
        self.context.as_ref()
    }

    fn advance(&mut self, expected: SessionPhase, next: SessionPhase, reason: &str) -> DomainResult<()> {
        if self.phase != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: next.to_string(),
                reason: reason.to_string(),
            });
        }
        self.phase = next;
        Ok(())
    }

    /// Accept a new turn and assemble its decision context.
    pub async fn begin_turn(&mut self, observation: TurnObservation) -> DomainResult<&DecisionContext> {
        self.advance(
            SessionPhase::AwaitingTurn,
            SessionPhase::BuildingContext,
            "a turn can only begin between turns",
        )?;

        match self.build_context(&observation).await {
            Ok(context) => {
                self.battle_id
                    .get_or_insert_with(|| observation.state.battle_id.clone());
                self.observation = Some(observation);
                self.phase = SessionPhase::AwaitingDecision;
                Ok(&*self.context.insert(context))
            }
            Err(err) => {
                self.phase = SessionPhase::AwaitingTurn;
                Err(err)
            }
        }
    }

    async fn build_context(&mut self, observation: &TurnObservation) -> DomainResult<DecisionContext> {
        let agent = self.agent;
        let brain = agent.brain.lock().await;

        let variant = match self.variant_id.as_ref().and_then(|id| brain.pool.get(id)) {
            Some(variant) => variant.clone(),
            None => {
                if let Some(stale) = &self.variant_id {
                    tracing::warn!(variant = %stale, "battle variant left the pool, reselecting");
                }
                brain.pool.active_variant()?.clone()
            }
        };
        let recalled = brain
            .memory
            .retrieve(&observation.state, agent.config.memory.recall_top_k);
        let context = agent.builder.build(
            &variant,
            observation,
            &brain.actions,
            &recalled,
            &brain.opponents,
        )?;
        drop(brain);

        self.variant_id = Some(variant.id);
        Ok(context)
    }

    /// Obtain this turn's action from the decision maker, or from the bandit
    /// when the decision maker is unavailable, refused by the gate, or keeps
    /// replying with malformed output.
    pub async fn decide(&mut self) -> DomainResult<StructuredAction> {
        if self.phase != SessionPhase::AwaitingDecision {
            return Err(DomainError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: SessionPhase::ApplyingReward.to_string(),
                reason: "no decision context has been built".to_string(),
            });
        }
        let context = self.context.clone().ok_or_else(|| {
            DomainError::InvariantViolation("decision context missing".to_string())
        })?;

        let action = match self.consult(&context).await {
            Some(action) => action,
            None => self.fallback(&context).await?,
        };

        tracing::debug!(
            agent_id = %self.agent.profile.agent_id,
            action = %action.action,
            source = action.source.as_str(),
            "turn decided"
        );
        self.context = None;
        self.pending = Some(action.clone());
        self.phase = SessionPhase::ApplyingReward;
        Ok(action)
    }

    async fn consult(&mut self, context: &DecisionContext) -> Option<StructuredAction> {
        let agent = self.agent;
        let timeout = Duration::from_secs(agent.config.agent.decision_timeout_secs);
        let mut request = context.clone();

        for attempt in 0..=agent.config.agent.max_decision_retries {
            let verdict = agent.gate.try_acquire().await;
            if !verdict.is_allowed() {
                tracing::warn!(
                    agent_id = %agent.profile.agent_id,
                    verdict = ?verdict,
                    "decision call refused, using bandit fallback"
                );
                return None;
            }

            let result = tokio::time::timeout(timeout, agent.decision_maker.decide(&request))
                .await
                .unwrap_or(Err(DecisionError::Timeout(timeout)));

            let reason = match result {
                Ok(action) if request.is_legal(&action.action) => {
                    agent.gate.record_success().await;
                    return Some(action);
                }
                Ok(action) => {
                    agent.gate.record_success().await;
                    format!("{} is not one of the available actions", action.action)
                }
                Err(DecisionError::Malformed { reason, .. }) => {
                    agent.gate.record_success().await;
                    reason
                }
                Err(err) => {
                    agent.gate.record_failure().await;
                    tracing::warn!(
                        agent_id = %agent.profile.agent_id,
                        error = %err,
                        "decision maker failed, using bandit fallback"
                    );
                    return None;
                }
            };

            self.malformed_replies += 1;
            tracing::warn!(
                agent_id = %agent.profile.agent_id,
                attempt,
                reason = %reason,
                "malformed decision rejected"
            );
            let legal = context
                .legal_actions
                .iter()
                .map(|action| action.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            request = context.with_correction(format!(
                "Your previous reply was rejected: {reason}. \
                 Choose exactly one of [{legal}] and end with: ACTION: <action_name>"
            ));
        }
        None
    }

    async fn fallback(&mut self, context: &DecisionContext) -> DomainResult<StructuredAction> {
        let agent = self.agent;
        let brain = agent.brain.lock().await;
        let action = match brain.actions.best(&context.legal_actions) {
            Some(best) => best,
            None => {
                let total = brain.actions.pulls_in_scope(&context.legal_actions);
                brain.actions.select(&context.legal_actions, total)?
            }
        };
        drop(brain);

        self.fallbacks += 1;
        Ok(StructuredAction::fallback(
            action,
            format!("{} falls back on what has worked before.", agent.profile.name),
        ))
    }

    /// Credit the executed action with its shaped reward and remember the turn.
    pub async fn apply_reward(&mut self, feedback: &TurnFeedback) -> DomainResult<f64> {
        self.advance(
            SessionPhase::ApplyingReward,
            SessionPhase::AwaitingTurn,
            "no decided action is awaiting its reward",
        )?;
        let (Some(action), Some(observation)) = (self.pending.take(), self.observation.take())
        else {
            return Err(DomainError::InvariantViolation(
                "decided turn is missing its action or observation".to_string(),
            ));
        };

        let agent = self.agent;
        let reward = agent.rewards.turn_reward(feedback);
        {
            let mut guard = agent.brain.lock().await;
            let brain: &mut Brain = &mut guard;
            brain.actions.update(&action.action, reward);
            if let Some(variant_id) = &self.variant_id {
                credit_variant(brain, variant_id, reward)?;
            }
            brain.memory.insert(NewEpisode::from_state(
                &observation.state,
                action.action.clone(),
                reward,
            ));
            if let Some(opponent_action) = &feedback.opponent_action {
                brain.opponents.observe(
                    &observation.state.opponent_id,
                    opponent_action,
                    feedback.damage_taken,
                );
            }
            brain.record.damage_dealt += u64::from(feedback.damage_dealt);
            brain.record.damage_taken += u64::from(feedback.damage_taken);
        }

        self.turns += 1;
        Ok(reward)
    }

    /// Close the battle: credit the terminal outcome, update the record, and
    /// run an evolution cycle when one is due.
    ///
    /// An abort raised before the outcome is credited leaves the battle
    /// unrecorded. One raised while variants are generated abandons the cycle
    /// and keeps the pool as it was.
    pub async fn finish(
        mut self,
        outcome: BattleOutcome,
        recap: &str,
        abort: &AbortSignal,
    ) -> DomainResult<BattleSummary> {
        if abort.is_aborted() && self.phase == SessionPhase::AwaitingTurn {
            self.abort();
            return Ok(self.summary(None, None));
        }
        self.advance(
            SessionPhase::AwaitingTurn,
            SessionPhase::Done,
            "a battle can only finish between turns",
        )?;

        let agent = self.agent;
        let due = {
            let mut guard = agent.brain.lock().await;
            let brain: &mut Brain = &mut guard;
            if let Some(variant_id) = &self.variant_id {
                credit_variant(brain, variant_id, agent.rewards.terminal_reward(outcome))?;
            }
            brain.record.record(outcome);
            brain.games_since_evolution += 1;

            let games = brain.games_since_evolution;
            let plan = brain.pool.plan_evolution(games);
            if plan.is_some() {
                brain.games_since_evolution = 0;
            }
            plan.map(|plan| (plan, games, performance_notes(brain, recap)))
        };

        tracing::info!(
            agent_id = %agent.profile.agent_id,
            battle_id = self.battle_id.as_deref().unwrap_or("-"),
            outcome = %outcome,
            turns = self.turns,
            fallbacks = self.fallbacks,
            "battle complete"
        );

        let evolution = match due {
            Some((plan, games, notes)) => self.evolve(&plan, games, &notes, abort).await?,
            None => None,
        };
        Ok(self.summary(Some(outcome), evolution))
    }

    /// Generate replacements outside the lock and commit them, unless `abort`
    /// fires first. An abandoned cycle hands its game count back so the next
    /// finished battle plans again.
    async fn evolve(
        &self,
        plan: &EvolutionPlan,
        games: u32,
        notes: &str,
        abort: &AbortSignal,
    ) -> DomainResult<Option<EvolutionReport>> {
        let agent = self.agent;
        let timeout = Duration::from_secs(agent.config.prompt_pool.generation_timeout_secs);

        let generated = if abort.is_aborted() {
            None
        } else {
            let generation =
                generate_for_plan(plan, agent.variant_generator.as_ref(), notes, timeout);
            tokio::select! {
                results = generation => Some(results),
                () = abort.cancelled() => None,
            }
        };

        let mut brain = agent.brain.lock().await;
        let Some(results) = generated.filter(|_| !abort.is_aborted()) else {
            brain.games_since_evolution += games;
            tracing::info!(
                agent_id = %agent.profile.agent_id,
                seed = %plan.seed_id,
                "prompt evolution cycle abandoned on abort"
            );
            return Ok(None);
        };
        let report = brain.pool.commit_evolution(plan, results)?;
        drop(brain);

        tracing::info!(
            agent_id = %agent.profile.agent_id,
            seed = %plan.seed_id,
            marked = plan.cull.len(),
            replaced = report.replaced.len(),
            aborted = report.aborted.len(),
            "prompt evolution cycle finished"
        );
        Ok(Some(report))
    }

    /// Stop the battle. Nothing further is recorded and no collaborator is called.
    pub fn abort(&mut self) {
        if self.phase != SessionPhase::Done {
            tracing::info!(
                agent_id = %self.agent.profile.agent_id,
                battle_id = self.battle_id.as_deref().unwrap_or("-"),
                phase = %self.phase,
                "battle aborted"
            );
        }
        self.phase = SessionPhase::Done;
        self.context = None;
        self.pending = None;
        self.observation = None;
    }

    fn summary(&self, outcome: Option<BattleOutcome>, evolution: Option<EvolutionReport>) -> BattleSummary {
        BattleSummary {
            battle_id: self.battle_id.clone(),
            outcome,
            turns: self.turns,
            fallbacks: self.fallbacks,
            malformed_replies: self.malformed_replies,
            variant_id: self.variant_id.clone(),
            evolution,
        }
    }
}

/// Credit a variant, tolerating one that was culled by a concurrent battle.
fn credit_variant(brain: &mut Brain, variant_id: &VariantId, reward: f64) -> DomainResult<()> {
    match brain.pool.record_result(variant_id, reward) {
        Err(DomainError::VariantNotFound(id)) => {
            tracing::warn!(variant = %id, "reward for a variant no longer in the pool dropped");
            Ok(())
        }
        other => other,
    }
}

fn performance_notes(brain: &Brain, recap: &str) -> String {
    let record = &brain.record;
    format!(
        "{}\nRecord: {}W / {}L / {}D (win rate {:.0}%)\nLatest battle: {}",
        brain.pool.performance_notes(),
        record.wins,
        record.losses,
        record.draws,
        record.win_rate() * 100.0,
        recap
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{ActionKey, AgentProfile, BattleState, Combatant, Config};
    use crate::domain::ports::{DecisionMaker, NullVariantGenerator};
    use crate::infrastructure::vector::HashedFeatureEmbedder;
    use crate::services::agent::Collaborators;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Always(&'static str);

    #[async_trait]
    impl DecisionMaker for Always {
        fn name(&self) -> &'static str {
            "always"
        }

        async fn decide(&self, _: &DecisionContext) -> Result<StructuredAction, DecisionError> {
            Ok(StructuredAction::from_model(ActionKey::new(self.0), "steady"))
        }
    }

    fn agent(reply: &'static str) -> Agent {
        Agent::new(
            AgentProfile::new("agent-1", "Vex", "rogue"),
            Config::default(),
            Collaborators {
                embedder: Arc::new(HashedFeatureEmbedder::default()),
                decision_maker: Arc::new(Always(reply)),
                variant_generator: Arc::new(NullVariantGenerator::new()),
            },
        )
        .unwrap()
    }

    fn combatant(name: &str) -> Combatant {
        Combatant {
            name: name.to_string(),
            class: "knight".to_string(),
            hp: 90,
            max_hp: 100,
            mp: 0,
            max_mp: 0,
        }
    }

    fn observation(legal: &[&str]) -> TurnObservation {
        TurnObservation {
            state: BattleState {
                battle_id: "b-1".to_string(),
                round: 1,
                max_rounds: 10,
                environment: "arena".to_string(),
                opponent_id: "opp".to_string(),
                me: combatant("Vex"),
                opponent: combatant("Brannoc"),
                items: vec![],
                recent_events: vec![],
            },
            legal_actions: legal.iter().map(|a| ActionKey::new(a)).collect(),
        }
    }

    #[tokio::test]
    async fn test_out_of_order_calls_are_rejected() {
        let agent = agent("attack");
        let mut session = agent.start_battle();

        assert!(matches!(
            session.decide().await,
            Err(DomainError::InvalidStateTransition { .. })
        ));
        assert!(matches!(
            session.apply_reward(&TurnFeedback::default()).await,
            Err(DomainError::InvalidStateTransition { .. })
        ));

        session.begin_turn(observation(&["attack"])).await.unwrap();
        assert!(matches!(
            session.begin_turn(observation(&["attack"])).await,
            Err(DomainError::InvalidStateTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_turn_cycle_records_everything() {
        let agent = agent("attack");
        let mut session = agent.start_battle();

        session.begin_turn(observation(&["attack", "defend"])).await.unwrap();
        assert_eq!(session.phase(), SessionPhase::AwaitingDecision);
        let action = session.decide().await.unwrap();
        assert_eq!(action.action, ActionKey::new("attack"));
        assert!(!action.is_fallback());

        let reward = session
            .apply_reward(&TurnFeedback {
                damage_dealt: 15,
                ..TurnFeedback::default()
            })
            .await
            .unwrap();
        assert!((reward - 0.5).abs() < 1e-12);
        assert_eq!(session.phase(), SessionPhase::AwaitingTurn);

        let variant = session.variant_id().cloned().unwrap();
        let brain = agent.brain().await;
        assert_eq!(brain.actions().get(&ActionKey::new("attack")).unwrap().pull_count, 1);
        assert_eq!(brain.pool().stat(&variant).unwrap().pull_count, 1);
        assert_eq!(brain.memory().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_legal_actions_keep_session_between_turns() {
        let agent = agent("attack");
        let mut session = agent.start_battle();
        let result = session.begin_turn(observation(&[])).await;
        assert!(matches!(result, Err(DomainError::NoCandidateActions)));
        assert_eq!(session.phase(), SessionPhase::AwaitingTurn);
    }

    #[tokio::test]
    async fn test_abort_blocks_further_calls() {
        let agent = agent("attack");
        let mut session = agent.start_battle();
        session.begin_turn(observation(&["attack"])).await.unwrap();
        session.abort();
        assert_eq!(session.phase(), SessionPhase::Done);
        assert!(session.decide().await.is_err());
        assert!(agent.brain().await.actions().is_empty());
    }

    #[tokio::test]
    async fn test_finish_rejected_mid_turn() {
        let agent = agent("attack");
        let mut session = agent.start_battle();
        session.begin_turn(observation(&["attack"])).await.unwrap();
        let result = session.finish(BattleOutcome::Won, "", &AbortSignal::never()).await;
        assert!(matches!(result, Err(DomainError::InvalidStateTransition { .. })));
    }

    #[tokio::test]
    async fn test_finish_after_abort_records_no_outcome() {
        let agent = agent("attack");
        let mut session = agent.start_battle();
        session.begin_turn(observation(&["attack"])).await.unwrap();
        session.decide().await.unwrap();
        session
            .apply_reward(&TurnFeedback {
                damage_dealt: 30,
                ..TurnFeedback::default()
            })
            .await
            .unwrap();

        let (handle, signal) = AbortHandle::new();
        handle.abort();
        let summary = session.finish(BattleOutcome::Won, "", &signal).await.unwrap();

        assert!(summary.aborted());
        assert_eq!(summary.turns, 1);
        let brain = agent.brain().await;
        assert_eq!(brain.record().games(), 0);
        assert_eq!(brain.games_since_evolution(), 0);
        assert_eq!(brain.actions().get(&ActionKey::new("attack")).unwrap().pull_count, 1);
        let variant = summary.variant_id.unwrap();
        assert_eq!(brain.pool().stat(&variant).unwrap().pull_count, 1);
    }

    #[tokio::test]
    async fn test_abort_signal_never_fires() {
        let signal = AbortSignal::never();
        assert!(!signal.is_aborted());
        let fired = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(fired.is_err());

        let (handle, signal) = AbortHandle::new();
        handle.abort();
        assert!(signal.is_aborted());
        signal.cancelled().await;
    }
}
