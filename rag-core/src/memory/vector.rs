//! Store-backed vector memory
//!
//! Ingestion chunks drafts to the content ceiling, generates the three
//! per-fragment embeddings, and persists them in one transaction. Retrieval
//! loads the collection and runs the weighted-cosine pipeline.

use super::{embed_drafts, rank_fragments, render_hits, Recall, SearchOptions};
use crate::constants::defaults;
use crate::embeddings::SharedEmbedder;
use crate::error::Result;
use crate::store::{with_one_retry, FragmentStore};
use crate::types::{CollectionStats, FragmentDraft};
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

/// Weighted multi-embedding semantic search over a persisted fragment store.
pub struct VectorMemory {
    store: Arc<dyn FragmentStore>,
    embedder: SharedEmbedder,
    active_collection: String,
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl VectorMemory {
    /// Create a vector memory over `store`, querying `active_collection` by
    /// default.
    pub fn new(
        store: Arc<dyn FragmentStore>,
        embedder: SharedEmbedder,
        active_collection: impl Into<String>,
    ) -> Self {
        let cache_size = NonZeroUsize::new(defaults::QUERY_EMBEDDING_CACHE_SIZE)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            store,
            embedder,
            active_collection: active_collection.into(),
            query_cache: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// The collection queried when a search does not override it.
    #[must_use]
    pub fn active_collection(&self) -> &str {
        &self.active_collection
    }

    /// Embed a query, memoizing recent queries so a repeated question does
    /// not pay the provider round-trip twice.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        if let Some(cached) = self.query_cache.lock().get(query).cloned() {
            debug!("Query embedding cache hit");
            return Ok(cached);
        }
        let embedding = self.embedder.embed(query).await?;
        self.query_cache
            .lock()
            .put(query.to_string(), embedding.clone());
        Ok(embedding)
    }
}

#[async_trait]
impl Recall for VectorMemory {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Option<String>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let query_embedding = self.embed_query(query).await?;

        let collection = options
            .collection
            .as_deref()
            .unwrap_or(&self.active_collection);
        let fragments = with_one_retry("load_by_collection", || {
            self.store.load_by_collection(collection)
        })
        .await?;
        if fragments.is_empty() {
            debug!("Collection {} holds no fragments", collection);
            return Ok(None);
        }

        let hits = rank_fragments(&query_embedding, fragments, options)?;
        if hits.is_empty() {
            debug!(
                "No fragment cleared min_score {} in {}",
                options.min_score, collection
            );
            return Ok(None);
        }

        info!(
            "Retrieved {} fragments from {} (best score {:.3})",
            hits.len(),
            collection,
            hits[0].score
        );
        Ok(Some(render_hits(&hits, options)))
    }

    async fn ingest(
        &self,
        drafts: Vec<FragmentDraft>,
        collection: &str,
        replace_existing: bool,
    ) -> Result<usize> {
        if replace_existing
            && with_one_retry("collection_exists", || {
                self.store.collection_exists(collection)
            })
            .await?
        {
            info!("Replacing existing collection {}", collection);
            with_one_retry("delete_collection", || {
                self.store.delete_collection(collection)
            })
            .await?;
        }

        let fragments = embed_drafts(&self.embedder, drafts, collection).await?;
        if fragments.is_empty() {
            return Ok(0);
        }

        with_one_retry("bulk_insert", || self.store.bulk_insert(&fragments)).await?;
        info!(
            "Ingested {} fragments into {} (dimension {})",
            fragments.len(),
            collection,
            self.embedder.dimension()
        );
        Ok(fragments.len())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        with_one_retry("list_collections", || self.store.list_collections()).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        with_one_retry("delete_collection", || {
            self.store.delete_collection(collection)
        })
        .await
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        with_one_retry("stats", || self.store.stats(collection)).await
    }
}
