//! SQLite implementation of the AgentStateRepository.
//!
//! One row per agent plus ordered child tables for action stats, prompt variants,
//! variant stats and episodes. A save replaces all of an agent's rows in a single
//! transaction, so a reader never observes a half-written snapshot.

use async_trait::async_trait;
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionKey, ActionStat, AgentProfile, AgentSnapshot, ArmStat, BattleRecord, Episode,
    MemorySnapshot, OpponentModel, PromptPoolSnapshot, PromptVariant, VariantId, VariantStat,
};
use crate::domain::ports::AgentStateRepository;

#[derive(Clone)]
pub struct SqliteStateRepository {
    pool: SqlitePool,
}

impl SqliteStateRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write_agent(tx: &mut Transaction<'_, Sqlite>, snapshot: &AgentSnapshot) -> DomainResult<()> {
        let opponents_json = serde_json::to_string(&snapshot.opponents)?;
        let record = &snapshot.record;

        sqlx::query(
            r#"INSERT INTO agents (agent_id, name, class, wins, losses, draws, damage_dealt,
                damage_taken, games_since_evolution, next_episode_sequence, opponents, saved_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
               ON CONFLICT(agent_id) DO UPDATE SET
                name = excluded.name, class = excluded.class, wins = excluded.wins,
                losses = excluded.losses, draws = excluded.draws,
                damage_dealt = excluded.damage_dealt, damage_taken = excluded.damage_taken,
                games_since_evolution = excluded.games_since_evolution,
                next_episode_sequence = excluded.next_episode_sequence,
                opponents = excluded.opponents, saved_at = excluded.saved_at"#,
        )
        .bind(&snapshot.profile.agent_id)
        .bind(&snapshot.profile.name)
        .bind(&snapshot.profile.class)
        .bind(i64::from(record.wins))
        .bind(i64::from(record.losses))
        .bind(i64::from(record.draws))
        .bind(to_i64(record.damage_dealt, "damage_dealt")?)
        .bind(to_i64(record.damage_taken, "damage_taken")?)
        .bind(i64::from(snapshot.games_since_evolution))
        .bind(to_i64(snapshot.memory.next_sequence, "next_episode_sequence")?)
        .bind(opponents_json)
        .bind(snapshot.saved_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn clear_children(tx: &mut Transaction<'_, Sqlite>, agent_id: &str) -> DomainResult<()> {
        for table in ["action_stats", "prompt_variants", "variant_stats", "episodes"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE agent_id = ?"))
                .bind(agent_id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    async fn write_action_stats(
        tx: &mut Transaction<'_, Sqlite>,
        agent_id: &str,
        stats: &[ActionStat],
    ) -> DomainResult<()> {
        for (position, stat) in stats.iter().enumerate() {
            sqlx::query(
                "INSERT INTO action_stats (agent_id, position, action, pull_count, cumulative_reward)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(agent_id)
            .bind(to_i64(position as u64, "position")?)
            .bind(stat.key.as_str())
            .bind(to_i64(stat.pull_count, "pull_count")?)
            .bind(stat.cumulative_reward)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn write_prompt_pool(
        tx: &mut Transaction<'_, Sqlite>,
        agent_id: &str,
        pool: &PromptPoolSnapshot,
    ) -> DomainResult<()> {
        for (position, variant) in pool.variants.iter().enumerate() {
            sqlx::query(
                "INSERT INTO prompt_variants (agent_id, position, variant_id, text, generation, parent_id, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(agent_id)
            .bind(to_i64(position as u64, "position")?)
            .bind(variant.id.as_str())
            .bind(&variant.text)
            .bind(i64::from(variant.generation))
            .bind(variant.parent_id.as_ref().map(VariantId::as_str))
            .bind(variant.created_at.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        }

        for (position, stat) in pool.stats.iter().enumerate() {
            sqlx::query(
                "INSERT INTO variant_stats (agent_id, position, variant_id, pull_count, cumulative_reward)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(agent_id)
            .bind(to_i64(position as u64, "position")?)
            .bind(stat.key.as_str())
            .bind(to_i64(stat.pull_count, "pull_count")?)
            .bind(stat.cumulative_reward)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn write_episodes(
        tx: &mut Transaction<'_, Sqlite>,
        agent_id: &str,
        episodes: &[Episode],
    ) -> DomainResult<()> {
        for episode in episodes {
            sqlx::query(
                "INSERT INTO episodes (agent_id, sequence, state_hash, canonical_state, state_summary,
                    embedding, action, outcome_reward, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(agent_id)
            .bind(to_i64(episode.sequence, "sequence")?)
            .bind(&episode.state_hash)
            .bind(&episode.canonical_state)
            .bind(&episode.state_summary)
            .bind(serde_json::to_string(&episode.embedding)?)
            .bind(episode.action.as_str())
            .bind(episode.outcome_reward)
            .bind(episode.recorded_at.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl AgentStateRepository for SqliteStateRepository {
    async fn load(&self, agent_id: &str) -> DomainResult<Option<AgentSnapshot>> {
        let agent: Option<AgentRow> = sqlx::query_as("SELECT * FROM agents WHERE agent_id = ?")
            .bind(agent_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(agent) = agent else {
            return Ok(None);
        };

        let action_rows: Vec<StatRow> = sqlx::query_as(
            "SELECT action AS key, pull_count, cumulative_reward FROM action_stats
             WHERE agent_id = ? ORDER BY position",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let variant_rows: Vec<VariantRow> = sqlx::query_as(
            "SELECT variant_id, text, generation, parent_id, created_at FROM prompt_variants
             WHERE agent_id = ? ORDER BY position",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let variant_stat_rows: Vec<StatRow> = sqlx::query_as(
            "SELECT variant_id AS key, pull_count, cumulative_reward FROM variant_stats
             WHERE agent_id = ? ORDER BY position",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let episode_rows: Vec<EpisodeRow> = sqlx::query_as(
            "SELECT sequence, state_hash, canonical_state, state_summary, embedding, action,
                    outcome_reward, recorded_at
             FROM episodes WHERE agent_id = ? ORDER BY sequence",
        )
        .bind(agent_id)
        .fetch_all(&self.pool)
        .await?;

        let action_stats = action_rows
            .into_iter()
            .map(|row| row.into_stat(ActionKey::from))
            .collect::<DomainResult<Vec<_>>>()?;
        let variants = variant_rows
            .into_iter()
            .map(PromptVariant::try_from)
            .collect::<DomainResult<Vec<_>>>()?;
        let variant_stats: Vec<VariantStat> = variant_stat_rows
            .into_iter()
            .map(|row| row.into_stat(VariantId::from_raw))
            .collect::<DomainResult<Vec<_>>>()?;
        let episodes = episode_rows
            .into_iter()
            .map(Episode::try_from)
            .collect::<DomainResult<Vec<_>>>()?;

        let snapshot = AgentSnapshot {
            profile: AgentProfile::new(agent.agent_id, agent.name, agent.class),
            record: BattleRecord {
                wins: to_u32(agent.wins, "wins")?,
                losses: to_u32(agent.losses, "losses")?,
                draws: to_u32(agent.draws, "draws")?,
                damage_dealt: to_u64(agent.damage_dealt, "damage_dealt")?,
                damage_taken: to_u64(agent.damage_taken, "damage_taken")?,
            },
            games_since_evolution: to_u32(agent.games_since_evolution, "games_since_evolution")?,
            action_stats,
            prompt_pool: PromptPoolSnapshot {
                variants,
                stats: variant_stats,
            },
            memory: MemorySnapshot {
                episodes,
                next_sequence: to_u64(agent.next_episode_sequence, "next_episode_sequence")?,
            },
            opponents: serde_json::from_str::<OpponentModel>(&agent.opponents)?,
            saved_at: super::parse_datetime(&agent.saved_at)?,
        };

        Ok(Some(snapshot))
    }

    async fn save(&self, snapshot: &AgentSnapshot) -> DomainResult<()> {
        let agent_id = snapshot.profile.agent_id.as_str();
        let mut tx = self.pool.begin().await?;

        Self::write_agent(&mut tx, snapshot).await?;
        Self::clear_children(&mut tx, agent_id).await?;
        Self::write_action_stats(&mut tx, agent_id, &snapshot.action_stats).await?;
        Self::write_prompt_pool(&mut tx, agent_id, &snapshot.prompt_pool).await?;
        Self::write_episodes(&mut tx, agent_id, &snapshot.memory.episodes).await?;

        tx.commit().await?;

        tracing::debug!(
            agent_id,
            variants = snapshot.prompt_pool.variants.len(),
            episodes = snapshot.memory.episodes.len(),
            "saved agent snapshot"
        );
        Ok(())
    }

    async fn list_agents(&self) -> DomainResult<Vec<AgentProfile>> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT agent_id, name, class FROM agents ORDER BY agent_id")
                .fetch_all(&self.pool)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(agent_id, name, class)| AgentProfile::new(agent_id, name, class))
            .collect())
    }
}

fn to_i64(value: u64, field: &str) -> DomainResult<i64> {
    i64::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("{field} out of range: {value}")))
}

fn to_u64(value: i64, field: &str) -> DomainResult<u64> {
    u64::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("Invalid {field}: {value}")))
}

fn to_u32(value: i64, field: &str) -> DomainResult<u32> {
    u32::try_from(value)
        .map_err(|_| DomainError::SerializationError(format!("Invalid {field}: {value}")))
}

#[derive(sqlx::FromRow)]
struct AgentRow {
    agent_id: String,
    name: String,
    class: String,
    wins: i64,
    losses: i64,
    draws: i64,
    damage_dealt: i64,
    damage_taken: i64,
    games_since_evolution: i64,
    next_episode_sequence: i64,
    opponents: String,
    saved_at: String,
}

#[derive(sqlx::FromRow)]
struct StatRow {
    key: String,
    pull_count: i64,
    cumulative_reward: f64,
}

impl StatRow {
    fn into_stat<K>(self, make_key: impl FnOnce(String) -> K) -> DomainResult<ArmStat<K>> {
        Ok(ArmStat {
            key: make_key(self.key),
            pull_count: to_u64(self.pull_count, "pull_count")?,
            cumulative_reward: self.cumulative_reward,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VariantRow {
    variant_id: String,
    text: String,
    generation: i64,
    parent_id: Option<String>,
    created_at: String,
}

impl TryFrom<VariantRow> for PromptVariant {
    type Error = DomainError;

    fn try_from(row: VariantRow) -> Result<Self, Self::Error> {
        Ok(PromptVariant {
            id: VariantId::from_raw(row.variant_id),
            text: row.text,
            created_at: super::parse_datetime(&row.created_at)?,
            generation: to_u32(row.generation, "generation")?,
            parent_id: row.parent_id.map(VariantId::from_raw),
        })
    }
}

#[derive(sqlx::FromRow)]
struct EpisodeRow {
    sequence: i64,
    state_hash: String,
    canonical_state: String,
    state_summary: String,
    embedding: String,
    action: String,
    outcome_reward: f64,
    recorded_at: String,
}

impl TryFrom<EpisodeRow> for Episode {
    type Error = DomainError;

    fn try_from(row: EpisodeRow) -> Result<Self, Self::Error> {
        Ok(Episode {
            sequence: to_u64(row.sequence, "sequence")?,
            state_hash: row.state_hash,
            canonical_state: row.canonical_state,
            state_summary: row.state_summary,
            embedding: serde_json::from_str(&row.embedding)?,
            action: ActionKey::new(row.action),
            outcome_reward: row.outcome_reward,
            recorded_at: super::parse_datetime(&row.recorded_at)?,
        })
    }
}
