//! Deterministic bag-of-hashed-tokens embedder.
//!
//! Each token of the canonical state is hashed with SHA-256 into one of
//! `dimensions` buckets and weighted by `1 / (position + 1)`, so the leading
//! tokens of a canonical form dominate similarity. The result is L2-normalized.
//! No randomness, clock, or process state is involved: the same text yields a
//! bit-identical vector on every run.

use sha2::{Digest, Sha256};

use crate::domain::ports::StateEmbedder;

/// Hashed-feature embedder with a fixed dimension and token budget.
#[derive(Debug, Clone)]
pub struct HashedFeatureEmbedder {
    dimensions: usize,
    max_tokens: usize,
}

impl HashedFeatureEmbedder {
    pub fn new(dimensions: usize, max_tokens: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            max_tokens,
        }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let hash = u64::from_be_bytes(prefix);
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for HashedFeatureEmbedder {
    fn default() -> Self {
        Self::new(64, 64)
    }
}

/// Lowercased alphanumeric tokens (underscores kept) in order of appearance.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
}

impl StateEmbedder for HashedFeatureEmbedder {
    fn name(&self) -> &'static str {
        "hashed-feature"
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut accum = vec![0.0f64; self.dimensions];
        for (position, token) in tokenize(text).take(self.max_tokens).enumerate() {
            accum[self.bucket(&token)] += 1.0 / (position as f64 + 1.0);
        }

        let magnitude: f64 = accum.iter().map(|x| x * x).sum::<f64>().sqrt();
        if magnitude > 1e-10 {
            accum.iter().map(|x| (x / magnitude) as f32).collect()
        } else {
            // No tokens: uniform unit vector.
            let uniform = (1.0 / (self.dimensions as f64).sqrt()) as f32;
            vec![uniform; self.dimensions]
        }
    }
}

/// Cosine similarity clamped to `[0, 1]`; mismatched or zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| f64::from(*x) * f64::from(*y))
        .sum();
    let mag_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    ((dot / (mag_a * mag_b)).clamp(0.0, 1.0)) as f32
}
