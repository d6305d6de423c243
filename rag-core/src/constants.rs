//! Global constants for rag-core
//!
//! Centralizes the magic numbers and fixed strings used throughout the
//! retrieval and generation paths.

/// Default configuration values
pub mod defaults {
    use std::time::Duration;

    // Worker pool
    pub const DEFAULT_POOL_SIZE: usize = 3;
    pub const MIN_POOL_SIZE: usize = 1;
    pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 30_000;

    // Generation idle window: silence this long after the assistant tag
    // has been seen completes the answer.
    pub const GENERATION_IDLE_WINDOW: Duration = Duration::from_secs(3);

    // Interval between prologue progress ticks while the model loads.
    pub const PROLOGUE_TICK_INTERVAL: Duration = Duration::from_secs(2);

    // Retrieval
    pub const DEFAULT_TOP_K: usize = 5;
    pub const DEFAULT_MIN_SCORE: f32 = 0.6;
    pub const DEFAULT_CATEGORY_WEIGHT: f32 = 0.40;
    pub const DEFAULT_CONTENT_WEIGHT: f32 = 0.30;
    pub const DEFAULT_COMBINED_WEIGHT: f32 = 0.30;

    // Embedding
    pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;
    pub const QUERY_EMBEDDING_CACHE_SIZE: usize = 128;

    // Ingestion
    pub const MAX_FRAGMENT_CONTENT_CHARS: usize = 1500;
    pub const MAX_CATEGORY_CHARS: usize = 500;

    // Conversation log
    pub const MAX_CONVERSATION_ENTRIES: usize = 20;

    // Store retry
    pub const STORE_RETRY_BACKOFF_MS: u64 = 200;
}

/// Generation parameters passed to the LLM CLI on every query.
pub mod generation {
    pub const MAX_TOKENS: u32 = 200;
    pub const TEMPERATURE: f32 = 0.3;
    pub const TOP_P: f32 = 0.85;
    pub const TOP_K: u32 = 30;
    pub const REPEAT_PENALTY: f32 = 1.15;
    pub const PRESENCE_PENALTY: f32 = 0.2;
    pub const FREQUENCY_PENALTY: f32 = 0.2;
}

/// Fixed prompt strings
pub mod prompts {
    /// The tag the model emits before its reply; everything before it is
    /// loader prologue.
    pub const ASSISTANT_TAG: &str = "Assistant:";

    /// Marker that opens a trailing control-token span in raw model output.
    pub const CONTROL_TOKEN_PREFIX: &str = "<|";

    /// A later user turn echoed by the model; the reply ends before it.
    pub const USER_TAG: &str = "User:";

    /// System directive prepended to every assembled prompt.
    pub const BASE_DIRECTIVE: &str = "You are a helpful assistant. Answer using ONLY the \
information in the context below. Do not invent rules, facts, or details that are not in \
the context. If the context does not contain the answer, say so. Keep replies short and \
direct.";

    /// Reply returned when retrieval produces no relevant fragments.
    pub const NO_CONTEXT_FALLBACK: &str = "I don't have any relevant information in my \
knowledge base to answer that question.";

    /// Prefix for replies rendered from generation-path failures.
    pub const ERROR_REPLY_PREFIX: &str = "[ERROR] Failed to get response: ";
}
