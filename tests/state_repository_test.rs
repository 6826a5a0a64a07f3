//! SQLite persistence of agent snapshots.

mod common;

use std::sync::Arc;

use common::{collaborators, test_config, ScriptedBattle, ScriptedDecisionMaker};
use tactician::adapters::sqlite::{
    create_migrated_test_pool, initialize_database, SqliteStateRepository,
};
use tactician::domain::models::{AgentProfile, AgentSnapshot, BattleOutcome, DatabaseConfig};
use tactician::domain::ports::{AgentStateRepository, NullVariantGenerator};
use tactician::services::{AbortSignal, Agent};

async fn trained_agent(agent_id: &str, action: &str, battles: usize) -> Agent {
    let agent = Agent::new(
        AgentProfile::new(agent_id, "Rook", "knight"),
        test_config(),
        collaborators(
            Arc::new(ScriptedDecisionMaker::always(action)),
            Arc::new(NullVariantGenerator::new()),
        ),
    )
    .unwrap();
    for i in 0..battles {
        let outcome = if i % 2 == 0 {
            BattleOutcome::Won
        } else {
            BattleOutcome::Lost
        };
        let mut battle = ScriptedBattle::new(format!("{agent_id}-b{i}"), 3, 18, outcome);
        agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();
    }
    agent
}

async fn memory_repository() -> SqliteStateRepository {
    SqliteStateRepository::new(create_migrated_test_pool().await.unwrap())
}

#[tokio::test]
async fn test_load_missing_agent_returns_none() {
    let repo = memory_repository().await;
    assert!(repo.load("nobody").await.unwrap().is_none());
    assert!(repo.list_agents().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_snapshot_round_trip() {
    let repo = memory_repository().await;
    let agent = trained_agent("rook-1", "defend", 3).await;
    let snapshot = agent.snapshot().await;

    repo.save(&snapshot).await.unwrap();
    let loaded = repo.load("rook-1").await.unwrap().unwrap();

    assert_eq!(loaded, snapshot);
    assert_eq!(loaded.record.wins, 2);
    assert_eq!(loaded.record.losses, 1);
    assert_eq!(loaded.memory.episodes.len(), 9);
    assert!(!loaded.opponents.entries().is_empty());
}

#[tokio::test]
async fn test_save_overwrites_previous_state() {
    let repo = memory_repository().await;
    let agent = trained_agent("rook-2", "attack", 1).await;
    repo.save(&agent.snapshot().await).await.unwrap();

    let mut battle = ScriptedBattle::new("rook-2-extra", 2, 30, BattleOutcome::Won);
    agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();
    let latest = agent.snapshot().await;
    repo.save(&latest).await.unwrap();

    let loaded = repo.load("rook-2").await.unwrap().unwrap();
    assert_eq!(loaded, latest);
    assert_eq!(loaded.record.wins, 2);
    assert_eq!(loaded.memory.episodes.len(), 5);
    assert_eq!(repo.list_agents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_list_agents_is_ordered_by_id() {
    let repo = memory_repository().await;
    for id in ["zed", "amber", "moss"] {
        let snapshot = trained_agent(id, "observe", 1).await.snapshot().await;
        repo.save(&snapshot).await.unwrap();
    }

    let ids: Vec<String> = repo
        .list_agents()
        .await
        .unwrap()
        .into_iter()
        .map(|profile| profile.agent_id)
        .collect();
    assert_eq!(ids, vec!["amber", "moss", "zed"]);
}

#[tokio::test]
async fn test_restored_agent_keeps_learning_from_file_database() {
    let dir = tempfile::tempdir().unwrap();
    let config = DatabaseConfig {
        path: dir.path().join("state").join("tactician.db").display().to_string(),
        ..DatabaseConfig::default()
    };

    let saved: AgentSnapshot = {
        let pool = initialize_database(&config).await.unwrap();
        let repo = SqliteStateRepository::new(pool.clone());
        let snapshot = trained_agent("rook-3", "use_item", 2).await.snapshot().await;
        repo.save(&snapshot).await.unwrap();
        pool.close().await;
        snapshot
    };

    // Reopening runs migrations again; they must be idempotent.
    let pool = initialize_database(&config).await.unwrap();
    let repo = SqliteStateRepository::new(pool);
    let loaded = repo.load("rook-3").await.unwrap().unwrap();
    assert_eq!(loaded, saved);

    let agent = Agent::from_snapshot(
        loaded,
        test_config(),
        collaborators(
            Arc::new(ScriptedDecisionMaker::always("use_item")),
            Arc::new(NullVariantGenerator::new()),
        ),
    )
    .unwrap();
    let mut battle = ScriptedBattle::new("rook-3-next", 1, 30, BattleOutcome::Won);
    agent.run_battle(&mut battle, &AbortSignal::never()).await.unwrap();

    let next = agent.snapshot().await;
    assert_eq!(next.memory.episodes.len(), 7);
    assert_eq!(next.memory.episodes.last().map(|e| e.sequence), Some(6));
    repo.save(&next).await.unwrap();
    assert_eq!(repo.load("rook-3").await.unwrap().unwrap(), next);
}
