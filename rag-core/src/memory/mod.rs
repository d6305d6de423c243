//! # Memory Capability
//!
//! Semantic recall over fragments. The orchestrator depends on the
//! [`Recall`] trait only; [`VectorMemory`](vector::VectorMemory) backs it
//! with a persistent store, [`SimpleMemory`](simple::SimpleMemory) with an
//! in-process fragment list. Both share the scoring and rendering pipeline
//! defined here.

pub mod simple;
pub mod vector;

pub use simple::SimpleMemory;
pub use vector::VectorMemory;

use crate::config::ScoreWeights;
use crate::constants::defaults;
use crate::embeddings::{cosine_similarity, provider::utils, SharedEmbedder};
use crate::error::{Error, Result};
use crate::types::{CollectionStats, Fragment, FragmentDraft, SearchHit};
use async_trait::async_trait;

/// Options for one retrieval call. `Default` mirrors the configured
/// defaults; callers override per request.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Maximum number of hits returned
    pub top_k: usize,
    /// Relevance threshold a fragment must reach
    pub min_score: f32,
    /// Collection override; `None` queries the active collection
    pub collection: Option<String>,
    /// Category tokens; when non-empty, hits must match at least one
    pub domain_filter: Vec<String>,
    /// Per-hit content truncation, with a trailing ellipsis when applied
    pub max_chars_per_hit: Option<usize>,
    /// Render the relevance score and category heading above each hit
    pub include_metadata: bool,
    /// Cosine mixing weights
    pub weights: ScoreWeights,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: defaults::DEFAULT_TOP_K,
            min_score: defaults::DEFAULT_MIN_SCORE,
            collection: None,
            domain_filter: Vec::new(),
            max_chars_per_hit: None,
            include_metadata: true,
            weights: ScoreWeights::default(),
        }
    }
}

/// Semantic recall capability: ingestion plus retrieval plus collection
/// administration.
#[async_trait]
pub trait Recall: Send + Sync {
    /// Search for fragments relevant to `query` and render them as a
    /// context block.
    ///
    /// # Returns
    ///
    /// `None` when the query is empty, the collection holds no fragments,
    /// or nothing clears the relevance threshold.
    ///
    /// # Errors
    ///
    /// Returns error on embedding or store failure
    async fn search(&self, query: &str, options: &SearchOptions) -> Result<Option<String>>;

    /// Chunk, embed, and persist a batch of drafts into `collection`.
    ///
    /// # Returns
    ///
    /// The number of fragments written (chunking may produce more fragments
    /// than drafts).
    ///
    /// # Errors
    ///
    /// Returns error on embedding or store failure
    async fn ingest(
        &self,
        drafts: Vec<FragmentDraft>,
        collection: &str,
        replace_existing: bool,
    ) -> Result<usize>;

    /// All known collection tags
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Remove a collection and all its fragments
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Aggregate statistics for one collection
    async fn stats(&self, collection: &str) -> Result<CollectionStats>;
}

/// Strip markdown heading markers from a category before embedding it.
#[must_use]
pub(crate) fn strip_category(category: &str) -> String {
    category.replace("##", "").trim().to_string()
}

/// Chunk drafts to the content ceiling and embed each produced chunk into a
/// persistable fragment. Shared by both recall implementations.
///
/// Chunk numbering is 1-based across the whole batch, not per draft.
pub(crate) async fn embed_drafts(
    embedder: &SharedEmbedder,
    drafts: Vec<FragmentDraft>,
    collection: &str,
) -> Result<Vec<Fragment>> {
    let chunks: Vec<FragmentDraft> = drafts
        .iter()
        .flat_map(|draft| {
            utils::chunk_text(&draft.content, defaults::MAX_FRAGMENT_CONTENT_CHARS)
                .into_iter()
                .map(|content| FragmentDraft {
                    category: draft.category.clone(),
                    content,
                    source_file: draft.source_file.clone(),
                })
                .collect::<Vec<_>>()
        })
        .collect();

    // Three embedding inputs per chunk, batched through one provider call.
    let mut inputs = Vec::with_capacity(chunks.len() * 3);
    for chunk in &chunks {
        let stripped = strip_category(&chunk.category);
        inputs.push(stripped.clone());
        inputs.push(chunk.content.clone());
        inputs.push(format!("{}\n\n{}", stripped, chunk.content));
    }
    let mut embeddings = embedder.embed_batch(&inputs).await?.into_iter();

    let mut fragments = Vec::with_capacity(chunks.len());
    for (position, chunk) in chunks.into_iter().enumerate() {
        let (Some(category_emb), Some(content_emb), Some(combined_emb)) =
            (embeddings.next(), embeddings.next(), embeddings.next())
        else {
            return Err(Error::Embedding(
                "provider returned fewer embeddings than requested".to_string(),
            ));
        };

        let mut fragment = Fragment::new(collection, chunk.category, chunk.content);
        fragment.category_embedding = Some(category_emb);
        fragment.content_embedding = Some(content_emb);
        fragment.combined_embedding = Some(combined_emb);
        fragment.embedding_dimension = Some(embedder.dimension());
        fragment.source_file = chunk.source_file;
        fragment.chunk_index = Some(u32::try_from(position + 1).unwrap_or(u32::MAX));
        fragments.push(fragment);
    }
    Ok(fragments)
}

/// Score one fragment against a query embedding.
///
/// Fragments carrying all three embeddings get the weighted score; legacy
/// rows with only a combined embedding get its plain cosine; rows with no
/// embeddings score 0.
pub(crate) fn score_fragment(
    query: &[f32],
    fragment: &Fragment,
    weights: &ScoreWeights,
) -> Result<f32> {
    if fragment.has_all_embeddings() {
        // Presence is guaranteed by has_all_embeddings.
        let category = fragment.category_embedding.as_deref().unwrap_or(&[]);
        let content = fragment.content_embedding.as_deref().unwrap_or(&[]);
        let combined = fragment.combined_embedding.as_deref().unwrap_or(&[]);
        Ok(weights.category * cosine_similarity(query, category)?
            + weights.content * cosine_similarity(query, content)?
            + weights.combined * cosine_similarity(query, combined)?)
    } else if let Some(combined) = fragment.combined_embedding.as_deref() {
        cosine_similarity(query, combined)
    } else {
        Ok(0.0)
    }
}

/// Rank fragments against a query embedding: score, sort descending, apply
/// the domain filter, drop sub-threshold scores, take the first `top_k`.
pub(crate) fn rank_fragments(
    query: &[f32],
    fragments: Vec<Fragment>,
    options: &SearchOptions,
) -> Result<Vec<SearchHit>> {
    let mut hits = Vec::with_capacity(fragments.len());
    for fragment in fragments {
        let score = score_fragment(query, &fragment, &options.weights)?;
        hits.push(SearchHit { fragment, score });
    }

    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    if !options.domain_filter.is_empty() {
        let tokens: Vec<String> = options
            .domain_filter
            .iter()
            .map(|token| token.replace('-', " ").to_lowercase())
            .filter(|token| !token.trim().is_empty())
            .collect();
        if !tokens.is_empty() {
            hits.retain(|hit| {
                let category = hit.fragment.category.replace('-', " ").to_lowercase();
                tokens.iter().any(|token| category.contains(token))
            });
        }
    }

    hits.retain(|hit| hit.score >= options.min_score);
    hits.truncate(options.top_k);
    Ok(hits)
}

/// Render ranked hits as the context block handed to prompt assembly.
#[must_use]
pub(crate) fn render_hits(hits: &[SearchHit], options: &SearchOptions) -> String {
    let mut blocks = Vec::with_capacity(hits.len());
    for hit in hits {
        let mut block = String::new();
        if options.include_metadata {
            block.push_str(&format!("[Relevance: {:.3}]\n", hit.score));
            block.push_str(&format!("[{}]\n", hit.fragment.category));
        }
        match options.max_chars_per_hit {
            Some(max) if hit.fragment.content.chars().count() > max => {
                let truncated: String = hit.fragment.content.chars().take(max).collect();
                block.push_str(&truncated);
                block.push_str("...");
            }
            _ => block.push_str(&hit.fragment.content),
        }
        blocks.push(block);
    }
    blocks.join("\n\n")
}
