//! State embedding infrastructure
//!
//! Deterministic hashed-feature vectors and cosine similarity for episodic recall.

pub mod hashed_embedder;

pub use hashed_embedder::{cosine_similarity, tokenize, HashedFeatureEmbedder};
