//! Semantic embedding generation and similarity math
//!
//! The provider itself is external; this module defines its contract, the
//! single-flight wrapper the retrieval path goes through, and the cosine
//! similarity used for scoring.

pub mod mock;
pub mod provider;
pub mod similarity;

pub use mock::MockEmbedder;
pub use provider::EmbeddingProvider;
pub use similarity::cosine_similarity;

use crate::error::{Error, Result};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Single-flight wrapper around an embedding provider.
///
/// Providers are assumed safe for one in-flight call but not necessarily
/// for parallel calls, so every `embed` goes through an internal mutex.
/// The wrapper also pins the process-wide dimension D and rejects any
/// vector of a different length before it can reach storage.
#[derive(Clone)]
pub struct SharedEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    flight_lock: Arc<Mutex<()>>,
    dimension: usize,
}

impl SharedEmbedder {
    /// Wrap a provider, pinning the expected dimension.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            flight_lock: Arc::new(Mutex::new(())),
            dimension,
        }
    }

    /// The pinned embedding dimension D.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embed one text, serialized against all other callers.
    ///
    /// # Errors
    ///
    /// Returns `Error::Embedding` on provider failure and
    /// `Error::DimensionMismatch` when the provider returns a vector whose
    /// length differs from the pinned dimension.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let _flight = self.flight_lock.lock().await;
        let embedding = self.provider.embed_text(text).await?;
        if embedding.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }

    /// Embed several texts in order, holding the flight lock across the batch.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let _flight = self.flight_lock.lock().await;
        let embeddings = self.provider.embed_batch(texts).await?;
        for embedding in &embeddings {
            if embedding.len() != self.dimension {
                return Err(Error::DimensionMismatch {
                    expected: self.dimension,
                    actual: embedding.len(),
                });
            }
        }
        Ok(embeddings)
    }
}
