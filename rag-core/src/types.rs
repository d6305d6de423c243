//! Common types shared across the RAG engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The atomic unit of knowledge: a category heading plus free-form content,
/// persisted with up to three embedding vectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    /// Unique fragment identifier
    pub id: Uuid,
    /// Collection tag grouping fragments into an independently queryable set
    pub collection: String,
    /// Short heading; doubles as a semantic label
    pub category: String,
    /// Free-form text content
    pub content: String,
    /// Cached byte length of `content`, kept in sync on every write path
    pub content_length: usize,
    /// Embedding of `category + "\n\n" + content`
    pub combined_embedding: Option<Vec<f32>>,
    /// Embedding of the category heading alone (migration-added, may be absent)
    pub category_embedding: Option<Vec<f32>>,
    /// Embedding of the content alone (migration-added, may be absent)
    pub content_embedding: Option<Vec<f32>>,
    /// Dimension recorded at write time; equals the length of each present embedding
    pub embedding_dimension: Option<usize>,
    /// Source file the fragment was chunked from, if any
    pub source_file: Option<String>,
    /// 1-based position within the ingestion batch, if any
    pub chunk_index: Option<u32>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Fragment {
    /// Create a fragment with no embeddings attached yet.
    pub fn new(collection: impl Into<String>, category: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            collection: collection.into(),
            category: category.into(),
            content_length: content.len(),
            content,
            combined_embedding: None,
            category_embedding: None,
            content_embedding: None,
            embedding_dimension: None,
            source_file: None,
            chunk_index: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the content, keeping `content_length` and `updated_at` in sync.
    ///
    /// Embeddings are left intact; regenerating them is a delete-then-insert
    /// concern of the ingestion path.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.content_length = self.content.len();
        self.updated_at = Utc::now();
    }

    /// True if at least one embedding column is populated.
    #[must_use]
    pub fn has_any_embedding(&self) -> bool {
        self.combined_embedding.is_some()
            || self.category_embedding.is_some()
            || self.content_embedding.is_some()
    }

    /// True if all three embedding columns are populated (post-migration rows).
    #[must_use]
    pub fn has_all_embeddings(&self) -> bool {
        self.combined_embedding.is_some()
            && self.category_embedding.is_some()
            && self.content_embedding.is_some()
    }
}

/// Raw input to ingestion: a category heading and content, before chunking
/// and embedding generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragmentDraft {
    /// Short heading; doubles as a semantic label
    pub category: String,
    /// Free-form text content (chunked to the soft ceiling during ingestion)
    pub content: String,
    /// Provenance, if the draft came from a file
    pub source_file: Option<String>,
}

impl FragmentDraft {
    pub fn new(category: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            content: content.into(),
            source_file: None,
        }
    }

    #[must_use]
    pub fn with_source_file(mut self, source_file: impl Into<String>) -> Self {
        self.source_file = Some(source_file.into());
        self
    }
}

/// A scored retrieval result, produced by search and consumed by prompt
/// assembly within a single request.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matched fragment
    pub fragment: Fragment,
    /// Weighted cosine score
    pub score: f32,
}

/// Aggregate statistics for one collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionStats {
    /// Number of fragments in the collection
    pub fragment_count: usize,
    /// Sum of `content_length` over all fragments
    pub total_content_bytes: u64,
    /// Number of fragments with at least one embedding
    pub embedded_count: usize,
}
