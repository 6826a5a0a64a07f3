//! End-to-end agent behaviour with scripted collaborators.

mod common;

use std::sync::Arc;

use common::{
    collaborators, model_action, observation, test_config, AbortAfterLastTurn,
    AbortingDecisionMaker, CountingGenerator, ScriptedBattle, ScriptedDecisionMaker,
    StallingGenerator,
};
use tactician::domain::models::{ActionKey, AgentProfile, BattleOutcome, TurnFeedback};
use tactician::domain::ports::{
    AgentStateRepository, DecisionError, InMemoryStateRepository, NullVariantGenerator,
};
use tactician::services::{
    AbortHandle, AbortSignal, Agent, Brain, CircuitState, SeriesMode, SeriesRunner,
    SessionPhase,
};
use tactician::DomainError;

fn profile() -> AgentProfile {
    AgentProfile::new("kael-1", "Kael", "mage")
}

fn agent_with(decision_maker: Arc<ScriptedDecisionMaker>) -> Agent {
    Agent::new(
        profile(),
        test_config(),
        collaborators(decision_maker, Arc::new(NullVariantGenerator::new())),
    )
    .unwrap()
}

#[tokio::test]
async fn test_battle_records_turn_and_terminal_rewards() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("cast_spell"));
    let agent = agent_with(decision_maker.clone());
    let mut battle = ScriptedBattle::new("b-1", 3, 15, BattleOutcome::Won);

    let summary = agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    assert_eq!(summary.outcome, Some(BattleOutcome::Won));
    assert_eq!(summary.turns, 3);
    assert_eq!(summary.fallbacks, 0);
    assert_eq!(summary.battle_id.as_deref(), Some("b-1"));
    assert_eq!(decision_maker.calls(), 3);

    let brain = agent.brain().await;
    let stat = brain.actions().get(&ActionKey::new("cast_spell")).unwrap();
    assert_eq!(stat.pull_count, 3);
    assert!((stat.mean_reward() - 0.5).abs() < 1e-12);

    let variant_id = summary.variant_id.unwrap();
    let variant_stat = brain.pool().stat(&variant_id).unwrap();
    assert_eq!(variant_stat.pull_count, 4);
    assert!((variant_stat.cumulative_reward - 2.5).abs() < 1e-12);

    assert_eq!(brain.memory().len(), 3);
    assert_eq!(brain.record().wins, 1);
    assert_eq!(brain.record().damage_dealt, 45);
    assert_eq!(brain.games_since_evolution(), 1);
}

#[tokio::test]
async fn test_one_variant_per_battle() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("attack"));
    let agent = agent_with(decision_maker.clone());
    let mut battle = ScriptedBattle::new("b-1", 4, 10, BattleOutcome::Lost);

    agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    let prompts: Vec<String> = decision_maker
        .contexts()
        .into_iter()
        .map(|context| context.variant_id.to_string())
        .collect();
    assert_eq!(prompts.len(), 4);
    assert!(prompts.iter().all(|id| id == &prompts[0]));
}

#[tokio::test]
async fn test_unavailable_decision_maker_falls_back_and_opens_circuit() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::failing());
    let agent = agent_with(decision_maker.clone());
    let mut battle = ScriptedBattle::new("b-1", 5, 20, BattleOutcome::Draw);

    let summary = agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    assert_eq!(summary.fallbacks, 5);
    // failure_threshold defaults to 3; the open circuit skips the remaining calls.
    assert_eq!(decision_maker.calls(), 3);
    assert_eq!(agent.gate().circuit_state().await, CircuitState::Open);

    assert!(battle.actions.iter().all(|action| action.is_fallback()));
    assert!(battle.actions[0]
        .narration
        .contains("Kael falls back on what has worked before."));
    // First fallback explores; afterwards the only tried action is the best one.
    assert!(battle
        .actions
        .iter()
        .all(|action| action.action == battle.actions[0].action));
}

#[tokio::test]
async fn test_malformed_reply_is_retried_with_correction() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::new(
        vec![
            Err(DecisionError::malformed("reply has no ACTION line", "I wait.")),
            Ok(model_action("defend")),
        ],
        Ok(model_action("attack")),
    ));
    let agent = agent_with(decision_maker.clone());
    let mut battle = ScriptedBattle::new("b-1", 1, 5, BattleOutcome::Lost);

    let summary = agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    assert_eq!(summary.malformed_replies, 1);
    assert_eq!(summary.fallbacks, 0);
    assert_eq!(battle.actions[0].action, ActionKey::new("defend"));

    let contexts = decision_maker.contexts();
    assert_eq!(contexts.len(), 2);
    assert!(contexts[0].correction.is_none());
    let correction = contexts[1].correction.as_deref().unwrap();
    assert!(correction.contains("reply has no ACTION line"));
    assert!(contexts[1].user_message().ends_with(correction));
}

#[tokio::test]
async fn test_illegal_actions_exhaust_retries_then_fall_back() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("summon_dragon"));
    let agent = agent_with(decision_maker.clone());
    let mut battle = ScriptedBattle::new("b-1", 1, 5, BattleOutcome::Lost);

    let summary = agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    // One initial call plus max_decision_retries (1).
    assert_eq!(decision_maker.calls(), 2);
    assert_eq!(summary.malformed_replies, 2);
    assert_eq!(summary.fallbacks, 1);
    assert!(battle.actions[0].is_fallback());
    // Malformed replies do not count against the circuit.
    assert_eq!(agent.gate().circuit_state().await, CircuitState::Closed);
}

#[tokio::test]
async fn test_prompt_pool_evolves_after_five_games() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("attack"));
    let generator = Arc::new(CountingGenerator::default());
    let agent = Agent::new(
        profile(),
        test_config(),
        collaborators(decision_maker, generator.clone()),
    )
    .unwrap();
    let original: Vec<String> = agent
        .brain()
        .await
        .pool()
        .variants()
        .iter()
        .map(|variant| variant.id.to_string())
        .collect();

    let mut evolutions = Vec::new();
    for game in 0..5 {
        let outcome = if game % 2 == 0 {
            BattleOutcome::Won
        } else {
            BattleOutcome::Lost
        };
        let mut battle = ScriptedBattle::new(format!("b-{game}"), 3, 6 * (game + 1), outcome);
        let summary = agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();
        evolutions.push(summary.evolution);
    }

    assert!(evolutions[..4].iter().all(Option::is_none));
    let report = evolutions[4].as_ref().unwrap();
    assert_eq!(report.replaced.len(), 1);
    assert!(report.aborted.is_empty());
    assert_eq!(generator.calls(), 1);

    let brain = agent.brain().await;
    assert_eq!(brain.games_since_evolution(), 0);
    assert_eq!(brain.pool().len(), original.len());

    let (culled, child) = &report.replaced[0];
    assert!(original.contains(&culled.to_string()));
    assert!(brain.pool().get(culled).is_none());
    let child_variant = brain.pool().get(child).unwrap();
    assert_eq!(child_variant.generation, 1);
    assert_eq!(brain.pool().stat(child).unwrap().pull_count, 0);
}

#[tokio::test]
async fn test_aborted_battle_records_nothing() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("attack"));
    let agent = agent_with(decision_maker.clone());
    let (handle, signal) = AbortHandle::new();
    handle.abort();

    let mut battle = ScriptedBattle::new("b-1", 3, 10, BattleOutcome::Won);
    let summary = agent.run_battle(&mut battle, &signal).await.unwrap();

    assert!(summary.aborted());
    assert_eq!(summary.turns, 0);
    assert_eq!(decision_maker.calls(), 0);

    let brain = agent.brain().await;
    assert_eq!(brain.record().games(), 0);
    assert_eq!(brain.games_since_evolution(), 0);
    assert!(brain.memory().is_empty());
}

/// Four completed games, one short of the default evolution interval.
async fn play_four_games(agent: &Agent) {
    for game in 0..4 {
        let outcome = if game % 2 == 0 {
            BattleOutcome::Won
        } else {
            BattleOutcome::Lost
        };
        let mut battle = ScriptedBattle::new(format!("b-{game}"), 3, 6 * (game + 1), outcome);
        agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();
    }
}

fn variant_ids(brain: &Brain) -> Vec<String> {
    brain
        .pool()
        .variants()
        .iter()
        .map(|variant| variant.id.to_string())
        .collect()
}

#[tokio::test]
async fn test_abort_during_decision_keeps_recorded_turns() {
    let (handle, signal) = AbortHandle::new();
    let decision_maker = Arc::new(AbortingDecisionMaker::new(handle, 2));
    let generator = Arc::new(CountingGenerator::default());
    let mut config = test_config();
    config.prompt_pool.evolve_every_games = 1;
    let agent = Agent::new(
        profile(),
        config,
        collaborators(decision_maker.clone(), generator.clone()),
    )
    .unwrap();

    let mut battle = ScriptedBattle::new("b-1", 3, 15, BattleOutcome::Won);
    let summary = agent.run_battle(&mut battle, &signal).await.unwrap();

    assert!(summary.aborted());
    assert_eq!(summary.turns, 1);
    assert!(summary.evolution.is_none());
    assert_eq!(decision_maker.calls(), 2);
    assert_eq!(battle.actions.len(), 1);
    assert_eq!(generator.calls(), 0);

    let brain = agent.brain().await;
    let stat = brain.actions().get(&ActionKey::new("attack")).unwrap();
    assert_eq!(stat.pull_count, 1);
    assert!((stat.mean_reward() - 0.5).abs() < 1e-12);
    let variant_stat = brain.pool().stat(&summary.variant_id.unwrap()).unwrap();
    assert_eq!(variant_stat.pull_count, 1);
    assert_eq!(brain.memory().len(), 1);
    assert_eq!(brain.record().games(), 0);
    assert_eq!(brain.games_since_evolution(), 0);
}

#[tokio::test]
async fn test_abort_after_final_turn_skips_outcome_and_evolution() {
    let decision_maker = Arc::new(ScriptedDecisionMaker::always("attack"));
    let generator = Arc::new(CountingGenerator::default());
    let agent = Agent::new(
        profile(),
        test_config(),
        collaborators(decision_maker.clone(), generator.clone()),
    )
    .unwrap();
    play_four_games(&agent).await;
    let before = variant_ids(&*agent.brain().await);

    let (handle, signal) = AbortHandle::new();
    let mut battle = AbortAfterLastTurn::new(
        ScriptedBattle::new("b-4", 3, 30, BattleOutcome::Won),
        handle,
    );
    let summary = agent.run_battle(&mut battle, &signal).await.unwrap();

    assert!(summary.aborted());
    assert_eq!(summary.turns, 3);
    assert!(summary.evolution.is_none());
    assert_eq!(decision_maker.calls(), 15);
    assert_eq!(generator.calls(), 0);

    let brain = agent.brain().await;
    assert_eq!(brain.record().games(), 4);
    assert_eq!(brain.games_since_evolution(), 4);
    assert_eq!(brain.actions().get(&ActionKey::new("attack")).unwrap().pull_count, 15);
    assert_eq!(brain.memory().len(), 15);
    assert_eq!(variant_ids(&brain), before);
}

#[tokio::test]
async fn test_abort_during_generation_keeps_pool() {
    let (handle, signal) = AbortHandle::new();
    let generator = Arc::new(StallingGenerator::new(handle));
    let agent = Agent::new(
        profile(),
        test_config(),
        collaborators(
            Arc::new(ScriptedDecisionMaker::always("attack")),
            generator.clone(),
        ),
    )
    .unwrap();
    play_four_games(&agent).await;
    let before = variant_ids(&*agent.brain().await);

    let mut battle = ScriptedBattle::new("b-4", 3, 30, BattleOutcome::Won);
    let summary = agent.run_battle(&mut battle, &signal).await.unwrap();

    assert_eq!(summary.outcome, Some(BattleOutcome::Won));
    assert!(summary.evolution.is_none());
    assert_eq!(generator.calls(), 1);

    let brain = agent.brain().await;
    assert_eq!(brain.record().games(), 5);
    assert_eq!(brain.games_since_evolution(), 5);
    assert_eq!(variant_ids(&brain), before);
}

#[tokio::test]
async fn test_session_rejects_out_of_order_steps() {
    let agent = agent_with(Arc::new(ScriptedDecisionMaker::always("attack")));
    let mut session = agent.start_battle();

    let err = session.decide().await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

    let err = session.apply_reward(&TurnFeedback::default()).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));

    session.begin_turn(observation("b-1", 1)).await.unwrap();
    assert_eq!(session.phase(), SessionPhase::AwaitingDecision);
    let err = session.begin_turn(observation("b-1", 2)).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
}

#[tokio::test]
async fn test_parallel_series_persists_agent() {
    let agent = agent_with(Arc::new(ScriptedDecisionMaker::always("taunt")));
    let repository = Arc::new(InMemoryStateRepository::new());

    let report = SeriesRunner::new(&agent)
        .with_repository(repository.clone())
        .with_mode(SeriesMode::Parallel { max_concurrent: 3 })
        .run(6, |index| {
            ScriptedBattle::new(format!("b-{index}"), 2, 12, BattleOutcome::Won)
        })
        .await
        .unwrap();

    assert_eq!(report.completed(), 6);
    assert_eq!(report.count(BattleOutcome::Won), 6);
    assert!(report.errors.is_empty());
    assert!(!report.aborted);

    let saved = repository.load("kael-1").await.unwrap().unwrap();
    assert_eq!(saved.record.wins, 6);
    assert_eq!(saved.memory.episodes.len(), 12);
    assert_eq!(saved, agent.snapshot().await.with_saved_at(saved.saved_at));
}

#[tokio::test]
async fn test_agent_restores_from_snapshot() {
    let agent = agent_with(Arc::new(ScriptedDecisionMaker::always("observe")));
    let mut battle = ScriptedBattle::new("b-1", 2, 30, BattleOutcome::Won);
    agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();
    let snapshot = agent.snapshot().await;

    let restored = Agent::from_snapshot(
        snapshot.clone(),
        test_config(),
        collaborators(
            Arc::new(ScriptedDecisionMaker::always("observe")),
            Arc::new(NullVariantGenerator::new()),
        ),
    )
    .unwrap();

    let again = restored.snapshot().await;
    assert_eq!(again.with_saved_at(snapshot.saved_at), snapshot);
}
