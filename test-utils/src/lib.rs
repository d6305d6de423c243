//! # Test Utilities
//!
//! Shared test fixtures for the RAG engine:
//! - A keyword-sensitive deterministic embedding provider (related texts
//!   genuinely score higher than unrelated ones)
//! - An in-memory fragment store with transient-failure injection
//! - Fake LLM CLI scripts covering the worker's output contract
//! - Fragment builders

use rag_core::embeddings::provider::{utils, EmbeddingProvider};
use rag_core::error::{Error, Result};
use rag_core::store::FragmentStore;
use rag_core::types::{CollectionStats, Fragment, FragmentDraft};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

pub mod fake_llm;

pub use fake_llm::FakeLlm;

/// Deterministic embedder that hashes word tokens into dimensions.
///
/// Texts sharing words share vector mass, so similarity behaves like a
/// crude bag-of-words model: `"How do I attack?"` lands measurably closer
/// to `"Roll 2d6 to attack."` than to an unrelated sentence. Unlike a pure
/// text-hash mock this makes threshold and ranking tests meaningful.
pub struct KeywordEmbedder {
    dimension: usize,
}

impl KeywordEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn token_contribution(&self, token: &str, vector: &mut [f32]) {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let mut seed = hasher.finish();

        // Spread each token over a handful of dimensions.
        for _ in 0..4 {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            let index = (seed >> 33) as usize % self.dimension;
            let sign = if seed & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
        {
            self.token_contribution(token, &mut vector);
        }
        Ok(utils::normalize_vector(vector))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "keyword-embedder"
    }
}

/// In-memory fragment store with optional transient-failure injection.
#[derive(Default)]
pub struct InMemoryFragmentStore {
    fragments: Mutex<Vec<Fragment>>,
    /// Number of upcoming operations that fail with a transient error
    transient_failures: AtomicUsize,
}

impl InMemoryFragmentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` operations fail with `StorageTransient`.
    pub fn inject_transient_failures(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    fn maybe_fail(&self) -> Result<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::StorageTransient("injected failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FragmentStore for InMemoryFragmentStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn bulk_insert(&self, fragments: &[Fragment]) -> Result<()> {
        self.maybe_fail()?;
        self.fragments.lock().extend_from_slice(fragments);
        Ok(())
    }

    async fn load_by_collection(&self, collection: &str) -> Result<Vec<Fragment>> {
        self.maybe_fail()?;
        let mut fragments: Vec<Fragment> = self
            .fragments
            .lock()
            .iter()
            .filter(|fragment| fragment.collection == collection)
            .cloned()
            .collect();
        fragments.sort_by_key(|fragment| (fragment.chunk_index, fragment.created_at));
        Ok(fragments)
    }

    async fn load_paged(
        &self,
        collection: &str,
        page: usize,
        size: usize,
    ) -> Result<Vec<Fragment>> {
        let all = self.load_by_collection(collection).await?;
        Ok(all.into_iter().skip(page * size).take(size).collect())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        self.maybe_fail()?;
        Ok(self
            .fragments
            .lock()
            .iter()
            .filter(|fragment| fragment.collection == collection)
            .count())
    }

    async fn has_any_embeddings(&self, collection: &str) -> Result<bool> {
        self.maybe_fail()?;
        Ok(self
            .fragments
            .lock()
            .iter()
            .any(|fragment| fragment.collection == collection && fragment.has_any_embedding()))
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        self.maybe_fail()?;
        Ok(self
            .fragments
            .lock()
            .iter()
            .any(|fragment| fragment.collection == collection))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.maybe_fail()?;
        let mut collections: Vec<String> = self
            .fragments
            .lock()
            .iter()
            .map(|fragment| fragment.collection.clone())
            .collect();
        collections.sort();
        collections.dedup();
        Ok(collections)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.maybe_fail()?;
        self.fragments
            .lock()
            .retain(|fragment| fragment.collection != collection);
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.maybe_fail()?;
        let mut fragments = self.fragments.lock();
        let before = fragments.len();
        fragments.retain(|fragment| fragment.id != id);
        Ok(fragments.len() < before)
    }

    async fn update_content(&self, id: Uuid, new_content: &str) -> Result<()> {
        self.maybe_fail()?;
        let mut fragments = self.fragments.lock();
        let fragment = fragments
            .iter_mut()
            .find(|fragment| fragment.id == id)
            .ok_or_else(|| Error::Storage(format!("Fragment {id} not found")))?;
        fragment.set_content(new_content);
        Ok(())
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        self.maybe_fail()?;
        let fragments = self.fragments.lock();
        let mut stats = CollectionStats::default();
        for fragment in fragments.iter().filter(|f| f.collection == collection) {
            stats.fragment_count += 1;
            stats.total_content_bytes += fragment.content_length as u64;
            if fragment.has_any_embedding() {
                stats.embedded_count += 1;
            }
        }
        Ok(stats)
    }
}

/// Create a draft with just a category and content.
#[must_use]
pub fn draft(category: &str, content: &str) -> FragmentDraft {
    FragmentDraft::new(category, content)
}

/// Create a legacy fragment: only the combined embedding is present.
#[must_use]
pub fn legacy_fragment(collection: &str, category: &str, content: &str, combined: Vec<f32>) -> Fragment {
    let dimension = combined.len();
    let mut fragment = Fragment::new(collection, category, content);
    fragment.combined_embedding = Some(combined);
    fragment.embedding_dimension = Some(dimension);
    fragment
}
