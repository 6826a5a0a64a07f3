//! State embedder port for similarity recall.
//!
//! Embedding is synchronous: memory retrieval runs while the agent's state
//! lock is held.

/// Converts canonical state text into a fixed-dimension vector.
pub trait StateEmbedder: Send + Sync {
    /// Embedder name (e.g., "hashed-feature").
    fn name(&self) -> &'static str;

    /// Length of every vector this embedder returns.
    fn dimension(&self) -> usize;

    /// Embed one text. Must be deterministic: equal input, equal output.
    fn embed_text(&self, text: &str) -> Vec<f32>;
}
