#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::float_cmp)]

//! # RAG Core
//!
//! Core engine of a local, offline retrieval-augmented generation backend:
//! a bounded pool of LLM CLI workers, weighted multi-embedding semantic
//! search over a persisted fragment store, and the orchestrator that fuses
//! retrieved context with conversation history.
//!
//! ## Module Organization
//!
//! - [`workers`]: worker pool and per-query LLM CLI invocation
//! - [`memory`]: the recall capability, ingestion, and weighted search
//! - [`embeddings`]: embedding provider contract and similarity math
//! - [`store`]: fragment persistence contract (backends live elsewhere)
//! - [`chat`]: conversation log, prompt assembly, orchestrator
//! - [`config`]: typed settings with sensible defaults
//! - [`types`]: fragments and search results
//!
//! ## Quick Start
//!
//! ```no_run
//! use rag_core::chat::RagOrchestrator;
//! use rag_core::config::Settings;
//! use rag_core::embeddings::{MockEmbedder, SharedEmbedder};
//! use rag_core::memory::{Recall, SimpleMemory};
//! use rag_core::types::FragmentDraft;
//! use rag_core::workers::{WorkerConfig, WorkerPool, WorkerPoolConfig};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(settings: Settings) -> rag_core::Result<()> {
//! let embedder = SharedEmbedder::new(
//!     Arc::new(MockEmbedder::new(settings.embedding.dimension)),
//!     settings.embedding.dimension,
//! );
//! let memory = Arc::new(SimpleMemory::new(embedder, "rules"));
//! memory
//!     .ingest(
//!         vec![FragmentDraft::new("Combat", "Roll 2d6 to attack.")],
//!         "rules",
//!         false,
//!     )
//!     .await?;
//!
//! let pool = WorkerPool::new(WorkerPoolConfig {
//!     capacity: settings.pool.max_instances,
//!     worker: WorkerConfig {
//!         executable_path: settings.llm.executable_path.clone(),
//!         model_path: settings.llm.model_path.clone(),
//!         query_timeout: std::time::Duration::from_millis(settings.pool.timeout_ms),
//!     },
//! });
//! pool.warm_up(|done, total| println!("worker {done}/{total}")).await?;
//!
//! let orchestrator = RagOrchestrator::new(memory, pool.clone(), settings.rag);
//! let reply = orchestrator.ask("How do I attack?", &CancellationToken::new()).await?;
//! println!("{reply}");
//! pool.teardown().await;
//! # Ok(())
//! # }
//! ```

pub mod chat;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;
pub mod workers;

// Re-export commonly used types
pub use chat::{ConversationEntry, ConversationLog, RagOrchestrator, Role};
pub use config::{ScoreWeights, Settings};
pub use error::{Error, Result};
pub use memory::{Recall, SearchOptions, SimpleMemory, VectorMemory};
pub use store::FragmentStore;
pub use types::{CollectionStats, Fragment, FragmentDraft, SearchHit};
pub use workers::{LlmWorker, WorkerLease, WorkerPool, WorkerPoolConfig};
