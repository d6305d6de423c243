//! Configuration types for the RAG engine
//!
//! Loaded from TOML by the CLI; every section carries defaults so a
//! minimal file only needs the two required LLM paths.

use crate::constants::defaults;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level settings, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    pub llm: LlmSettings,
    #[serde(default)]
    pub pool: PoolSettings,
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub rag: RagSettings,
}

/// LLM CLI binding. Both paths are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmSettings {
    /// Path to the LLM CLI executable
    pub executable_path: PathBuf,
    /// Path to the model weights passed to the CLI
    pub model_path: PathBuf,
}

/// Worker pool sizing and deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PoolSettings {
    /// Pool capacity N (min 1)
    #[serde(default = "default_pool_size")]
    pub max_instances: usize,
    /// Absolute per-query deadline in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Embedding provider binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingSettings {
    /// Embedding dimension D, fixed per process lifetime
    #[serde(default = "default_dimension")]
    pub dimension: usize,
}

/// FragmentStore binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSettings {
    /// Database URL (`file:`, `:memory:`, or `libsql://`)
    #[serde(default = "default_connection_string")]
    pub connection_string: String,
    /// Collection queried and written by default
    #[serde(default = "default_collection")]
    pub active_collection: String,
}

/// Retrieval tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RagSettings {
    /// Maximum hits returned by a search
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Relevance threshold a fragment must reach to be returned
    #[serde(default = "default_min_score")]
    pub min_score: f32,
    /// Weighted-cosine mixing weights
    #[serde(default)]
    pub weights: ScoreWeights,
}

/// Weights for the three per-fragment cosine similarities. Should sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoreWeights {
    #[serde(default = "default_category_weight")]
    pub category: f32,
    #[serde(default = "default_content_weight")]
    pub content: f32,
    #[serde(default = "default_combined_weight")]
    pub combined: f32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_instances: default_pool_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            connection_string: default_connection_string(),
            active_collection: default_collection(),
        }
    }
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            weights: ScoreWeights::default(),
        }
    }
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            category: default_category_weight(),
            content: default_content_weight(),
            combined: default_combined_weight(),
        }
    }
}

fn default_pool_size() -> usize {
    defaults::DEFAULT_POOL_SIZE
}
fn default_timeout_ms() -> u64 {
    defaults::DEFAULT_QUERY_TIMEOUT_MS
}
fn default_dimension() -> usize {
    defaults::DEFAULT_EMBEDDING_DIMENSION
}
fn default_connection_string() -> String {
    "file:rag.db".to_string()
}
fn default_collection() -> String {
    "default".to_string()
}
fn default_top_k() -> usize {
    defaults::DEFAULT_TOP_K
}
fn default_min_score() -> f32 {
    defaults::DEFAULT_MIN_SCORE
}
fn default_category_weight() -> f32 {
    defaults::DEFAULT_CATEGORY_WEIGHT
}
fn default_content_weight() -> f32 {
    defaults::DEFAULT_CONTENT_WEIGHT
}
fn default_combined_weight() -> f32 {
    defaults::DEFAULT_COMBINED_WEIGHT
}

impl Settings {
    /// Validate the loaded settings.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` when a required key is missing or a value is
    /// out of range.
    pub fn validate(&self) -> Result<()> {
        if self.llm.executable_path.as_os_str().is_empty() {
            return Err(Error::Config("llm.executable_path is required".to_string()));
        }
        if self.llm.model_path.as_os_str().is_empty() {
            return Err(Error::Config("llm.model_path is required".to_string()));
        }
        if self.pool.max_instances < defaults::MIN_POOL_SIZE {
            return Err(Error::Config(format!(
                "pool.max_instances must be at least {}, got {}",
                defaults::MIN_POOL_SIZE,
                self.pool.max_instances
            )));
        }
        if self.embedding.dimension == 0 {
            return Err(Error::Config("embedding.dimension must be non-zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.rag.min_score) {
            return Err(Error::Config(format!(
                "rag.min_score must be within [0, 1], got {}",
                self.rag.min_score
            )));
        }
        let weight_sum =
            self.rag.weights.category + self.rag.weights.content + self.rag.weights.combined;
        if (weight_sum - 1.0).abs() > 1e-3 {
            return Err(Error::Config(format!(
                "rag.weights must sum to 1.0, got {weight_sum}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_settings() -> Settings {
        Settings {
            llm: LlmSettings {
                executable_path: PathBuf::from("/usr/bin/llama-cli"),
                model_path: PathBuf::from("/models/model.gguf"),
            },
            ..Settings::default()
        }
    }

    #[test]
    fn test_default_values() {
        let settings = valid_settings();
        assert_eq!(settings.pool.max_instances, 3);
        assert_eq!(settings.pool.timeout_ms, 30_000);
        assert_eq!(settings.embedding.dimension, 768);
        assert_eq!(settings.rag.top_k, 5);
        assert!((settings.rag.min_score - 0.6).abs() < f32::EPSILON);
        assert!((settings.rag.weights.category - 0.40).abs() < f32::EPSILON);
        assert!((settings.rag.weights.content - 0.30).abs() < f32::EPSILON);
        assert!((settings.rag.weights.combined - 0.30).abs() < f32::EPSILON);
    }

    #[test]
    fn test_validate_rejects_missing_paths() {
        let mut settings = valid_settings();
        settings.llm.executable_path = PathBuf::new();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_weights() {
        let mut settings = valid_settings();
        settings.rag.weights.category = 0.9;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut settings = valid_settings();
        settings.pool.max_instances = 0;
        assert!(settings.validate().is_err());
    }
}
