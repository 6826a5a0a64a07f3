//! Episodic memory: similarity recall over past decided turns.
//!
//! Episodes are append-only. When a capacity is configured, the oldest
//! episodes are evicted first (FIFO by sequence number). Identical episodes are
//! not deduplicated: inserting the same situation twice yields two entries.

use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    ActionKey, CanonicalState, Episode, MemoryConfig, MemorySnapshot, RetrievedEpisode,
};
use crate::domain::ports::StateEmbedder;
use crate::infrastructure::vector::cosine_similarity;

/// An episode before the memory assigns its sequence, hash, and embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEpisode {
    pub canonical_state: String,
    pub state_summary: String,
    pub action: ActionKey,
    pub outcome_reward: f64,
}

impl NewEpisode {
    pub fn from_state<S: CanonicalState + ?Sized>(
        state: &S,
        action: ActionKey,
        outcome_reward: f64,
    ) -> Self {
        Self {
            canonical_state: state.canonical_form(),
            state_summary: state.summary(),
            action,
            outcome_reward,
        }
    }
}

/// Hex SHA-256 of a canonical state.
pub fn state_hash(canonical: &str) -> String {
    Sha256::digest(canonical.as_bytes())
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

pub struct EpisodicMemory {
    embedder: Arc<dyn StateEmbedder>,
    max_episodes: Option<usize>,
    min_similarity: f32,
    scan_window: Option<usize>,
    episodes: VecDeque<Episode>,
    next_sequence: u64,
}

impl EpisodicMemory {
    pub fn new(embedder: Arc<dyn StateEmbedder>, config: &MemoryConfig) -> Self {
        Self {
            embedder,
            max_episodes: config.max_episodes,
            min_similarity: config.min_similarity,
            scan_window: config.scan_window,
            episodes: VecDeque::new(),
            next_sequence: 0,
        }
    }

    /// Rebuild from a snapshot, re-embedding episodes whose stored vectors do
    /// not match the current embedder's dimension.
    pub fn restore(
        embedder: Arc<dyn StateEmbedder>,
        config: &MemoryConfig,
        snapshot: MemorySnapshot,
    ) -> DomainResult<Self> {
        let mut memory = Self::new(embedder, config);
        let mut last_sequence: Option<u64> = None;
        let mut reembedded = 0usize;

        for mut episode in snapshot.episodes {
            if last_sequence.is_some_and(|last| episode.sequence <= last) {
                return Err(DomainError::InvariantViolation(format!(
                    "episode sequence {} is out of order",
                    episode.sequence
                )));
            }
            if !episode.outcome_reward.is_finite() {
                return Err(DomainError::InvariantViolation(format!(
                    "episode {} has a non-finite reward",
                    episode.sequence
                )));
            }
            if episode.embedding.len() != memory.embedder.dimension() {
                episode.embedding = memory.embedder.embed_text(&episode.canonical_state);
                reembedded += 1;
            }
            last_sequence = Some(episode.sequence);
            memory.episodes.push_back(episode);
        }

        let floor = last_sequence.map_or(0, |last| last + 1);
        memory.next_sequence = snapshot.next_sequence.max(floor);
        memory.evict_over_capacity();

        if reembedded > 0 {
            tracing::info!(
                reembedded,
                embedder = memory.embedder.name(),
                "re-embedded episodes after dimension change"
            );
        }
        Ok(memory)
    }

    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    /// Episodes in sequence order, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Episode> {
        self.episodes.iter()
    }

    pub fn embed<S: CanonicalState + ?Sized>(&self, state: &S) -> Vec<f32> {
        self.embedder.embed_text(&state.canonical_form())
    }

    /// Append an episode and return its sequence number.
    pub fn insert(&mut self, new_episode: NewEpisode) -> u64 {
        debug_assert!(new_episode.outcome_reward.is_finite());
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let episode = Episode {
            sequence,
            state_hash: state_hash(&new_episode.canonical_state),
            embedding: self.embedder.embed_text(&new_episode.canonical_state),
            canonical_state: new_episode.canonical_state,
            state_summary: new_episode.state_summary,
            action: new_episode.action,
            outcome_reward: new_episode.outcome_reward,
            recorded_at: Utc::now(),
        };
        self.episodes.push_back(episode);
        self.evict_over_capacity();
        sequence
    }

    /// The `k` most similar episodes to `state`, most similar first.
    ///
    /// Equal similarities are ordered most recent first. With the default
    /// `min_similarity` of 0 and no scan window this returns exactly
    /// `min(k, len)` episodes. Never mutates the memory.
    pub fn retrieve<S: CanonicalState + ?Sized>(&self, state: &S, k: usize) -> Vec<RetrievedEpisode> {
        if k == 0 || self.episodes.is_empty() {
            return Vec::new();
        }
        let query = self.embed(state);
        self.retrieve_by_embedding(&query, k)
    }

    pub fn retrieve_by_embedding(&self, query: &[f32], k: usize) -> Vec<RetrievedEpisode> {
        let skip = self
            .scan_window
            .map_or(0, |window| self.episodes.len().saturating_sub(window));

        let mut scored: Vec<(f32, &Episode)> = self
            .episodes
            .iter()
            .skip(skip)
            .map(|episode| (cosine_similarity(query, &episode.embedding), episode))
            .filter(|(similarity, _)| *similarity >= self.min_similarity)
            .collect();

        scored.sort_by(|(sim_a, ep_a), (sim_b, ep_b)| {
            sim_b
                .total_cmp(sim_a)
                .then_with(|| ep_b.sequence.cmp(&ep_a.sequence))
        });

        scored
            .into_iter()
            .take(k)
            .map(|(similarity, episode)| RetrievedEpisode {
                episode: episode.clone(),
                similarity,
            })
            .collect()
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            episodes: self.episodes.iter().cloned().collect(),
            next_sequence: self.next_sequence,
        }
    }

    fn evict_over_capacity(&mut self) {
        let Some(capacity) = self.max_episodes else {
            return;
        };
        let mut evicted = 0usize;
        while self.episodes.len() > capacity {
            self.episodes.pop_front();
            evicted += 1;
        }
        if evicted > 0 {
            tracing::debug!(evicted, capacity, "evicted oldest episodes");
        }
    }
}

impl fmt::Debug for EpisodicMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EpisodicMemory")
            .field("embedder", &self.embedder.name())
            .field("episodes", &self.episodes.len())
            .field("next_sequence", &self.next_sequence)
            .field("max_episodes", &self.max_episodes)
            .finish()
    }
}
