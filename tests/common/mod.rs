//! Common test utilities for integration tests
//!
//! Scripted collaborators and a scripted battle environment, so agent
//! behaviour can be driven without a game engine or a network.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tactician::domain::models::{
    standard_actions, ActionKey, BattleOutcome, BattleState, Combatant, Config, DecisionContext,
    StructuredAction, TurnFeedback, TurnObservation,
};
use tactician::domain::ports::{
    BattleEnvironment, DecisionError, DecisionMaker, GenerationError, VariantGenerator,
};
use tactician::domain::DomainResult;
use tactician::infrastructure::vector::HashedFeatureEmbedder;
use tactician::services::{AbortHandle, Collaborators};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Defaults with a rate limit high enough never to interfere.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.rate_limit.decisions_per_minute = 100_000;
    config.agent.decision_timeout_secs = 5;
    config.prompt_pool.generation_timeout_secs = 5;
    config
}

pub fn combatant(name: &str, class: &str, hp: u32) -> Combatant {
    Combatant {
        name: name.to_string(),
        class: class.to_string(),
        hp,
        max_hp: 100,
        mp: 20,
        max_mp: 40,
    }
}

pub fn battle_state(battle_id: &str, round: u32, hp: u32, opponent_hp: u32) -> BattleState {
    BattleState {
        battle_id: battle_id.to_string(),
        round,
        max_rounds: 10,
        environment: "Ashen Ruins".to_string(),
        opponent_id: "vex".to_string(),
        me: combatant("Kael", "mage", hp),
        opponent: combatant("Vex", "rogue", opponent_hp),
        items: vec!["potion".to_string()],
        recent_events: Vec::new(),
    }
}

pub fn observation(battle_id: &str, round: u32) -> TurnObservation {
    TurnObservation {
        state: battle_state(battle_id, round, 100 - round * 8, 100 - round * 10),
        legal_actions: standard_actions(),
    }
}

/// Decision maker that replays scripted replies, then always answers `default`.
pub struct ScriptedDecisionMaker {
    script: Mutex<VecDeque<Result<StructuredAction, DecisionError>>>,
    default: Result<StructuredAction, DecisionError>,
    calls: AtomicUsize,
    contexts: Mutex<Vec<DecisionContext>>,
}

impl ScriptedDecisionMaker {
    pub fn always(action: &str) -> Self {
        Self::new(Vec::new(), Ok(model_action(action)))
    }

    pub fn failing() -> Self {
        Self::new(
            Vec::new(),
            Err(DecisionError::Unavailable("connection refused".to_string())),
        )
    }

    pub fn new(
        script: Vec<Result<StructuredAction, DecisionError>>,
        default: Result<StructuredAction, DecisionError>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into()),
            default,
            calls: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn contexts(&self) -> Vec<DecisionContext> {
        self.contexts.lock().unwrap().clone()
    }
}

#[async_trait]
impl DecisionMaker for ScriptedDecisionMaker {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn decide(&self, context: &DecisionContext) -> Result<StructuredAction, DecisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(context.clone());
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default.clone())
    }
}

pub fn model_action(action: &str) -> StructuredAction {
    StructuredAction::from_model(ActionKey::new(action), format!("Kael chooses to {action}."))
}

/// Generator that writes a distinct, valid variant on every call.
#[derive(Default)]
pub struct CountingGenerator {
    calls: AtomicUsize,
}

impl CountingGenerator {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariantGenerator for CountingGenerator {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn generate_variant(
        &self,
        best_prompt: &str,
        _performance_notes: &str,
    ) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!(
            "Revision {n}. {best_prompt} Keep your guard up and strike when the opening is real."
        ))
    }
}

pub fn collaborators(
    decision_maker: Arc<dyn DecisionMaker>,
    variant_generator: Arc<dyn VariantGenerator>,
) -> Collaborators {
    Collaborators {
        embedder: Arc::new(HashedFeatureEmbedder::new(64, 64)),
        decision_maker,
        variant_generator,
    }
}

/// A battle of fixed length with constant damage per turn.
pub struct ScriptedBattle {
    battle_id: String,
    turns: u32,
    played: u32,
    damage_dealt: u32,
    damage_taken: u32,
    outcome: BattleOutcome,
    pub actions: Vec<StructuredAction>,
}

impl ScriptedBattle {
    pub fn new(battle_id: impl Into<String>, turns: u32, damage_dealt: u32, outcome: BattleOutcome) -> Self {
        Self {
            battle_id: battle_id.into(),
            turns,
            played: 0,
            damage_dealt,
            damage_taken: 12,
            outcome,
            actions: Vec::new(),
        }
    }
}

#[async_trait]
impl BattleEnvironment for ScriptedBattle {
    async fn next_turn(&mut self) -> DomainResult<Option<TurnObservation>> {
        if self.played >= self.turns {
            return Ok(None);
        }
        self.played += 1;
        Ok(Some(observation(&self.battle_id, self.played)))
    }

    async fn apply(&mut self, action: &StructuredAction) -> DomainResult<TurnFeedback> {
        self.actions.push(action.clone());
        Ok(TurnFeedback {
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            opponent_action: Some(ActionKey::new("attack")),
        })
    }

    fn outcome(&self) -> Option<BattleOutcome> {
        (self.played >= self.turns).then_some(self.outcome)
    }

    fn recap(&self) -> String {
        format!("{} turns, {} dealt per turn", self.played, self.damage_dealt)
    }
}

/// Decision maker that answers `attack` until call `abort_on`, where it raises
/// the abort and never answers.
pub struct AbortingDecisionMaker {
    handle: AbortHandle,
    abort_on: usize,
    calls: AtomicUsize,
}

impl AbortingDecisionMaker {
    pub fn new(handle: AbortHandle, abort_on: usize) -> Self {
        Self {
            handle,
            abort_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DecisionMaker for AbortingDecisionMaker {
    fn name(&self) -> &'static str {
        "aborting"
    }

    async fn decide(&self, _context: &DecisionContext) -> Result<StructuredAction, DecisionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.abort_on {
            self.handle.abort();
            return std::future::pending().await;
        }
        Ok(model_action("attack"))
    }
}

/// Generator that raises the abort and never returns a variant.
pub struct StallingGenerator {
    handle: AbortHandle,
    calls: AtomicUsize,
}

impl StallingGenerator {
    pub fn new(handle: AbortHandle) -> Self {
        Self {
            handle,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VariantGenerator for StallingGenerator {
    fn name(&self) -> &'static str {
        "stalling"
    }

    async fn generate_variant(
        &self,
        _best_prompt: &str,
        _performance_notes: &str,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.handle.abort();
        std::future::pending().await
    }
}

/// A scripted battle whose engine raises the abort once the last turn is played.
pub struct AbortAfterLastTurn {
    pub inner: ScriptedBattle,
    handle: AbortHandle,
}

impl AbortAfterLastTurn {
    pub fn new(inner: ScriptedBattle, handle: AbortHandle) -> Self {
        Self { inner, handle }
    }
}

#[async_trait]
impl BattleEnvironment for AbortAfterLastTurn {
    async fn next_turn(&mut self) -> DomainResult<Option<TurnObservation>> {
        let turn = self.inner.next_turn().await?;
        if turn.is_none() {
            self.handle.abort();
        }
        Ok(turn)
    }

    async fn apply(&mut self, action: &StructuredAction) -> DomainResult<TurnFeedback> {
        self.inner.apply(action).await
    }

    fn outcome(&self) -> Option<BattleOutcome> {
        self.inner.outcome()
    }

    fn recap(&self) -> String {
        self.inner.recap()
    }
}
