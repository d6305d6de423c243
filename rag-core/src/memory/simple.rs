//! In-process fragment memory
//!
//! Same scoring pipeline as [`VectorMemory`](super::VectorMemory) over a
//! plain in-memory fragment list. Useful for small rule sets and for tests
//! that should not touch a database.

use super::{embed_drafts, rank_fragments, render_hits, Recall, SearchOptions};
use crate::embeddings::SharedEmbedder;
use crate::error::Result;
use crate::types::{CollectionStats, Fragment, FragmentDraft};
use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

/// Store-less recall over an owned fragment list.
pub struct SimpleMemory {
    embedder: SharedEmbedder,
    active_collection: String,
    fragments: RwLock<Vec<Fragment>>,
}

impl SimpleMemory {
    pub fn new(embedder: SharedEmbedder, active_collection: impl Into<String>) -> Self {
        Self {
            embedder,
            active_collection: active_collection.into(),
            fragments: RwLock::new(Vec::new()),
        }
    }

    /// Number of fragments currently held, across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fragments.read().len()
    }

    /// True when no fragments are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fragments.read().is_empty()
    }
}

#[async_trait]
impl Recall for SimpleMemory {
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Option<String>> {
        if query.trim().is_empty() {
            return Ok(None);
        }

        let query_embedding = self.embedder.embed(query).await?;

        let collection = options
            .collection
            .as_deref()
            .unwrap_or(&self.active_collection);
        let fragments: Vec<Fragment> = self
            .fragments
            .read()
            .iter()
            .filter(|fragment| fragment.collection == collection)
            .cloned()
            .collect();
        if fragments.is_empty() {
            return Ok(None);
        }

        let hits = rank_fragments(&query_embedding, fragments, options)?;
        if hits.is_empty() {
            return Ok(None);
        }
        Ok(Some(render_hits(&hits, options)))
    }

    async fn ingest(
        &self,
        drafts: Vec<FragmentDraft>,
        collection: &str,
        replace_existing: bool,
    ) -> Result<usize> {
        if replace_existing {
            self.fragments
                .write()
                .retain(|fragment| fragment.collection != collection);
        }

        let built = embed_drafts(&self.embedder, drafts, collection).await?;
        let written = built.len();
        self.fragments.write().extend(built);
        debug!("Held {} fragments after ingest", self.len());
        Ok(written)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut collections: Vec<String> = self
            .fragments
            .read()
            .iter()
            .map(|fragment| fragment.collection.clone())
            .collect();
        collections.sort();
        collections.dedup();
        Ok(collections)
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.fragments
            .write()
            .retain(|fragment| fragment.collection != collection);
        Ok(())
    }

    async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        let fragments = self.fragments.read();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbedder;
    use std::sync::Arc;

    fn memory() -> SimpleMemory {
        let embedder = SharedEmbedder::new(Arc::new(MockEmbedder::new(32)), 32);
        SimpleMemory::new(embedder, "rules")
    }

    #[tokio::test]
    async fn test_ingest_then_search_round_trip() {
        let memory = memory();
        let written = memory
            .ingest(
                vec![FragmentDraft::new("Combat", "Roll 2d6 to attack.")],
                "rules",
                false,
            )
            .await
            .unwrap();
        assert_eq!(written, 1);

        // The mock embedder is deterministic, so the exact combined-input
        // text maximizes the combined component of the score.
        let options = SearchOptions {
            min_score: 0.0,
            top_k: 1,
            ..SearchOptions::default()
        };
        let rendered = memory
            .search("Combat\n\nRoll 2d6 to attack.", &options)
            .await
            .unwrap()
            .unwrap();
        assert!(rendered.contains("Roll 2d6 to attack."));
        assert!(rendered.contains("[Relevance: "));
    }

    #[tokio::test]
    async fn test_empty_query_returns_none() {
        let memory = memory();
        let result = memory.search("   ", &SearchOptions::default()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_replace_existing_clears_collection() {
        let memory = memory();
        memory
            .ingest(vec![FragmentDraft::new("A", "first")], "rules", false)
            .await
            .unwrap();
        memory
            .ingest(vec![FragmentDraft::new("B", "second")], "rules", true)
            .await
            .unwrap();
        assert_eq!(memory.len(), 1);
        let stats = memory.stats("rules").await.unwrap();
        assert_eq!(stats.fragment_count, 1);
        assert_eq!(stats.embedded_count, 1);
    }

    #[tokio::test]
    async fn test_collections_are_independent() {
        let memory = memory();
        memory
            .ingest(vec![FragmentDraft::new("A", "alpha")], "one", false)
            .await
            .unwrap();
        memory
            .ingest(vec![FragmentDraft::new("B", "beta")], "two", false)
            .await
            .unwrap();

        assert_eq!(
            memory.list_collections().await.unwrap(),
            vec!["one".to_string(), "two".to_string()]
        );

        memory.delete_collection("one").await.unwrap();
        assert_eq!(memory.list_collections().await.unwrap(), vec!["two".to_string()]);
    }
}
