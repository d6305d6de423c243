//! # Fragment Store Abstraction
//!
//! Collection-scoped persistence contract for fragments. Concrete backends
//! (libSQL, in-memory) live outside this crate; the retrieval and ingestion
//! paths only see this trait.

use crate::constants::defaults;
use crate::error::Result;
use crate::types::{CollectionStats, Fragment};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Collection-scoped fragment persistence.
///
/// Every operation is atomic on the backend side. Failures are reported as
/// `Error::Storage` (permanent) or `Error::StorageTransient` (retryable);
/// callers retry transient failures once via [`with_one_retry`].
#[async_trait]
pub trait FragmentStore: Send + Sync {
    /// Idempotently ensure the fragment table and columns exist, adding the
    /// migration-era embedding columns when absent.
    ///
    /// # Errors
    ///
    /// Returns error if schema creation fails
    async fn init_schema(&self) -> Result<()>;

    /// Write a batch of fragments with their embeddings in a single
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the transaction fails; no partial batch survives
    async fn bulk_insert(&self, fragments: &[Fragment]) -> Result<()>;

    /// Load ALL fragments in a collection, embeddings included, ordered by
    /// `(chunk_index, created_at)`.
    async fn load_by_collection(&self, collection: &str) -> Result<Vec<Fragment>>;

    /// Load one page of a collection with the same ordering as
    /// [`load_by_collection`](Self::load_by_collection). Pages are 0-based.
    async fn load_paged(&self, collection: &str, page: usize, size: usize)
        -> Result<Vec<Fragment>>;

    /// Number of fragments in a collection
    async fn count(&self, collection: &str) -> Result<usize>;

    /// True if any fragment in the collection has at least one embedding
    async fn has_any_embeddings(&self, collection: &str) -> Result<bool>;

    /// True if the collection holds at least one fragment
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    /// All distinct collection tags
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Remove every fragment carrying the collection tag
    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Delete one fragment by id.
    ///
    /// # Returns
    ///
    /// `true` if a row was deleted, `false` if the id was unknown
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Replace a fragment's content, updating `content_length` and
    /// `updated_at` while leaving the embeddings intact.
    async fn update_content(&self, id: Uuid, new_content: &str) -> Result<()>;

    /// Aggregate statistics for one collection
    async fn stats(&self, collection: &str) -> Result<CollectionStats>;
}

/// Run a store operation, retrying once after a short backoff when the
/// failure is transient.
///
/// # Errors
///
/// Returns the second failure unchanged, or the first when it is permanent.
pub async fn with_one_retry<T, F, Fut>(operation_name: &str, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match operation().await {
        Ok(value) => Ok(value),
        Err(err) if err.is_transient() => {
            warn!("Transient failure in {}, retrying once: {}", operation_name, err);
            tokio::time::sleep(Duration::from_millis(defaults::STORE_RETRY_BACKOFF_MS)).await;
            operation().await
        }
        Err(err) => Err(err),
    }
}
