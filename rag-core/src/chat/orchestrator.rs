//! # RAG Orchestrator
//!
//! Top-level request path: retrieval, prompt assembly, and dispatch through
//! the worker pool. The orchestrator's only state is the conversation log;
//! no LLM-side session state survives between calls.

use super::conversation::{ConversationEntry, ConversationLog, Role};
use super::prompt;
use crate::config::RagSettings;
use crate::constants::prompts;
use crate::error::{Error, Result};
use crate::memory::{Recall, SearchOptions};
use crate::types::{CollectionStats, FragmentDraft};
use crate::workers::WorkerPool;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use tokio_util::sync::CancellationToken;

/// Assembles each reply from retrieved context, conversation history, and
/// the fixed system directive, then dispatches through the worker pool.
pub struct RagOrchestrator {
    memory: Arc<dyn Recall>,
    pool: WorkerPool,
    log: Mutex<ConversationLog>,
    settings: RagSettings,
}

impl RagOrchestrator {
    /// Create an orchestrator over a recall capability and a warmed pool.
    pub fn new(memory: Arc<dyn Recall>, pool: WorkerPool, settings: RagSettings) -> Self {
        Self {
            memory,
            pool,
            log: Mutex::new(ConversationLog::default()),
            settings,
        }
    }

    /// Answer one question.
    ///
    /// Retrieval failures abort the request; generation failures do not —
    /// they are rendered as an `"[ERROR] …"` reply so the conversation log
    /// and caller experience stay consistent.
    ///
    /// # Errors
    ///
    /// - `Error::BadRequest` for an empty or whitespace question
    /// - `Error::Cancelled` / `Error::PoolClosed` from acquisition
    /// - store and embedding errors from the retrieval path
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<String> {
        if question.trim().is_empty() {
            return Err(Error::BadRequest("question must not be empty".to_string()));
        }

        self.log.lock().push(Role::User, question);

        let options = SearchOptions {
            top_k: self.settings.top_k,
            min_score: self.settings.min_score,
            weights: self.settings.weights,
            ..SearchOptions::default()
        };
        let context = self.memory.search(question, &options).await?;

        let Some(context) = context else {
            debug!("No relevant fragments; answering with the fallback reply");
            return Ok(prompts::NO_CONTEXT_FALLBACK.to_string());
        };

        let rendered_conversation = self.log.lock().render();
        let system_prompt =
            prompt::assemble(prompts::BASE_DIRECTIVE, Some(&context), &rendered_conversation)?;

        let outcome = match self.pool.acquire(cancel).await {
            Ok(mut lease) => {
                let outcome = match lease.worker() {
                    Ok(worker) => worker.query(&system_prompt, question, cancel).await,
                    Err(err) => Err(err),
                };
                lease.release();
                outcome
            }
            // Cancellation and shutdown propagate; a failed lazy respawn is
            // an LLM-side failure and renders like one.
            Err(err @ (Error::Cancelled | Error::PoolClosed)) => return Err(err),
            Err(err) => Err(err),
        };

        let reply = match outcome {
            Ok(response) => {
                if response.timed_out {
                    warn!("Reply was cut short by the query deadline");
                }
                if !response.text.is_empty() {
                    self.log.lock().push(Role::Assistant, response.text.clone());
                }
                response.text
            }
            Err(Error::Cancelled) => return Err(Error::Cancelled),
            Err(err) => {
                info!("Generation failed, rendering error reply: {}", err);
                format!("{}{}", prompts::ERROR_REPLY_PREFIX, err)
            }
        };

        Ok(reply)
    }

    /// Snapshot of the conversation log.
    #[must_use]
    pub fn conversation(&self) -> Vec<ConversationEntry> {
        self.log.lock().entries()
    }

    /// Ingest drafts into a collection through the recall capability.
    pub async fn ingest(
        &self,
        drafts: Vec<FragmentDraft>,
        collection: &str,
        replace_existing: bool,
    ) -> Result<usize> {
        self.memory.ingest(drafts, collection, replace_existing).await
    }

    /// All known collection tags.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        self.memory.list_collections().await
    }

    /// Remove a collection and all its fragments.
    pub async fn delete_collection(&self, collection: &str) -> Result<()> {
        self.memory.delete_collection(collection).await
    }

    /// Aggregate statistics for one collection.
    pub async fn stats(&self, collection: &str) -> Result<CollectionStats> {
        self.memory.stats(collection).await
    }
}
