//! # RAG Storage - libSQL
//!
//! libSQL/Turso fragment store backend for durable persistence of fragments
//! and their embeddings.
//!
//! This crate provides:
//! - Connection management for local files, in-memory databases, and remote
//!   Turso databases
//! - Schema creation and the single-to-triple embedding column migration
//! - The [`rag_core::store::FragmentStore`] implementation
//!
//! ## Example
//!
//! ```no_run
//! use rag_storage_libsql::LibsqlFragmentStore;
//! use rag_core::store::FragmentStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = LibsqlFragmentStore::connect("file:rag.db", "").await?;
//! store.init_schema().await?;
//! # Ok(())
//! # }
//! ```

use libsql::{Builder, Connection, Database};
use rag_core::error::{Error, Result};
use std::sync::Arc;
use tracing::info;

mod schema;
mod store;

/// libSQL-backed fragment store.
pub struct LibsqlFragmentStore {
    db: Arc<Database>,
}

impl LibsqlFragmentStore {
    /// Connect to a database.
    ///
    /// # Arguments
    ///
    /// * `url` - Database URL (only `libsql://`, `file:`, or `:memory:` allowed)
    /// * `token` - Authentication token (required for `libsql://`, empty otherwise)
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for a disallowed URL scheme or a remote URL
    /// without a token, and `Error::Storage` when the connection fails.
    pub async fn connect(url: &str, token: &str) -> Result<Self> {
        info!("Connecting to fragment store at {}", url);

        if !url.starts_with("libsql://") && !url.starts_with("file:") && url != ":memory:" {
            return Err(Error::Config(format!(
                "insecure database URL: {url}. Only libsql://, file:, or :memory: are allowed"
            )));
        }
        if url.starts_with("libsql://") && token.trim().is_empty() {
            return Err(Error::Config(
                "authentication token required for remote connections".to_string(),
            ));
        }

        let db = if url.starts_with("libsql://") {
            Builder::new_remote(url.to_string(), token.to_string())
                .build()
                .await
                .map_err(|e| Error::Storage(format!("Failed to connect: {e}")))?
        } else {
            let path = url.strip_prefix("file:").unwrap_or(url);
            Builder::new_local(path)
                .build()
                .await
                .map_err(|e| Error::Storage(format!("Failed to connect: {e}")))?
        };

        info!("Connected to fragment store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Wrap an already-built database; useful for tests.
    pub fn from_database(db: Database) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Open a connection for one logical operation.
    pub(crate) fn connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| Error::StorageTransient(format!("Failed to open connection: {e}")))
    }
}
