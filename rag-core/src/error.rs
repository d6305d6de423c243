/// Result type alias for RAG operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the local RAG engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transient storage error: {0}")]
    StorageTransient(String),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Worker is unhealthy")]
    WorkerUnhealthy,

    #[error("Worker timed out after {0} ms")]
    WorkerTimeout(u64),

    #[error("Failed to spawn worker: {0}")]
    WorkerSpawnFailed(String),

    #[error("Worker has been disposed")]
    WorkerDisposed,

    #[error("Pool is closed")]
    PoolClosed,

    #[error("Pool initialization failed: {0}")]
    PoolInitFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient (can retry with backoff)
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::StorageTransient(_))
    }
}
