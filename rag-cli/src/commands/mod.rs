//! Command implementations

pub mod ask;
pub mod collections;
pub mod ingest;

use crate::output;
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rag_core::config::Settings;
use rag_core::embeddings::{MockEmbedder, SharedEmbedder};
use rag_core::memory::VectorMemory;
use rag_core::store::FragmentStore;
use rag_core::workers::{WorkerConfig, WorkerPool, WorkerPoolConfig};
use rag_storage_libsql::LibsqlFragmentStore;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable carrying the auth token for remote stores.
const STORE_TOKEN_ENV: &str = "RAG_STORE_TOKEN";

/// Wired collaborators shared by the retrieval-side commands.
pub struct Runtime {
    pub settings: Settings,
    pub memory: Arc<VectorMemory>,
}

impl Runtime {
    /// Connect the store, ensure the schema, and build the vector memory.
    pub async fn connect(settings: Settings) -> Result<Self> {
        let token = std::env::var(STORE_TOKEN_ENV).unwrap_or_default();
        let store = LibsqlFragmentStore::connect(&settings.store.connection_string, &token)
            .await
            .context("failed to connect to the fragment store")?;
        store
            .init_schema()
            .await
            .context("failed to initialize the fragment schema")?;

        // The embedding network itself is an external collaborator; until a
        // real provider is wired in, retrieval runs on the deterministic
        // mock and cannot rank semantically.
        output::warning("using the mock embedding provider; semantic ranking is degraded");
        let embedder = SharedEmbedder::new(
            Arc::new(MockEmbedder::new(settings.embedding.dimension)),
            settings.embedding.dimension,
        );

        let memory = Arc::new(VectorMemory::new(
            Arc::new(store) as Arc<dyn FragmentStore>,
            embedder,
            settings.store.active_collection.clone(),
        ));

        Ok(Self { settings, memory })
    }

    /// Warm up a worker pool, driving a progress bar.
    pub async fn warm_pool(&self) -> Result<WorkerPool> {
        self.settings.validate()?;

        let pool = WorkerPool::new(WorkerPoolConfig {
            capacity: self.settings.pool.max_instances,
            worker: WorkerConfig {
                executable_path: self.settings.llm.executable_path.clone(),
                model_path: self.settings.llm.model_path.clone(),
                query_timeout: Duration::from_millis(self.settings.pool.timeout_ms),
            },
        });

        let bar = ProgressBar::new(self.settings.pool.max_instances as u64);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message("warming up workers");
        pool.warm_up(|completed, _total| bar.set_position(completed as u64))
            .await?;
        bar.finish_and_clear();

        Ok(pool)
    }
}
