//! Deterministic mock embedding provider for testing
//!
//! Produces hash-seeded pseudo-random vectors; deterministic per input text
//! but non-semantic, so it must never back a production index.

use super::provider::{utils, EmbeddingProvider};
use crate::error::Result;
use async_trait::async_trait;

/// Mock provider generating deterministic embeddings from a text hash.
pub struct MockEmbedder {
    name: String,
    dimension: usize,
}

impl MockEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            name: "mock-embedder".to_string(),
            dimension,
        }
    }

    /// Generate a deterministic embedding for the given text.
    #[must_use]
    pub fn generate(&self, text: &str) -> Vec<f32> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut seed = hasher.finish();

        let mut embedding = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let value = ((seed >> 16) as f32) / 32768.0 - 1.0;
            embedding.push(value);
        }

        utils::normalize_vector(embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }
}
