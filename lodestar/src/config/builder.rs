//! Configuration builder.
//!
//! This module provides a builder pattern API for creating configurations.

use super::{Result, models::*, validation};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Builder for creating LodestarConfig instances.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: LodestarConfig,
}

impl ConfigBuilder {
    /// Create a new configuration builder with default values.
    pub fn new() -> Self {
        Self {
            config: LodestarConfig::default(),
        }
    }

    /// Set the base data directory.
    pub fn with_data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.storage.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Load this workspace snapshot into the in-memory store at startup.
    pub fn with_snapshot_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.storage.snapshot_file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use the deterministic local hashing embedder.
    pub fn with_local_embeddings(mut self, dimensions: usize) -> Self {
        self.config.ml.embedding.model_type = EmbeddingModelType::Hashing;
        self.config.ml.embedding.model_name = "feature-hashing".to_string();
        self.config.ml.embedding.service_type = EmbeddingServiceType::Local;
        self.config.ml.embedding.service_url = None;
        self.config.ml.embedding.dimensions = dimensions;
        self
    }

    /// Configure to use a remote OpenAI-compatible embedding service.
    pub fn with_remote_embeddings(
        mut self,
        url: impl Into<String>,
        model_name: impl Into<String>,
        dimensions: usize,
    ) -> Self {
        self.config.ml.embedding.model_type = EmbeddingModelType::OpenAI;
        self.config.ml.embedding.model_name = model_name.into();
        self.config.ml.embedding.service_type = EmbeddingServiceType::Remote;
        self.config.ml.embedding.service_url = Some(url.into());
        self.config.ml.embedding.dimensions = dimensions;
        self
    }

    /// Replace the per-mode fusion weight table.
    pub fn with_fusion_weights(mut self, weights: ModeWeightTable) -> Self {
        self.config.fusion.weights = weights;
        self
    }

    /// Set the recency decay constant in hours.
    pub fn with_recency_half_life_hours(mut self, hours: f64) -> Self {
        self.config.fusion.recency_half_life_hours = hours;
        self
    }

    /// Set every generator's time budget at once.
    pub fn with_generator_timeout(mut self, timeout: Duration) -> Self {
        self.config.retrieval.knowledge_timeout = timeout;
        self.config.retrieval.neural_timeout = timeout;
        self.config.retrieval.temporal_timeout = timeout;
        self.config.retrieval.graph_timeout = timeout;
        self
    }

    /// Set the query embedding budget.
    pub fn with_embedding_timeout(mut self, timeout: Duration) -> Self {
        self.config.retrieval.embedding_timeout = timeout;
        self
    }

    /// Set the rerank budget.
    pub fn with_rerank_timeout(mut self, timeout: Duration) -> Self {
        self.config.rerank.timeout = timeout;
        self
    }

    /// Use a remote cross-encoder rerank service.
    pub fn with_remote_rerank(mut self, url: impl Into<String>) -> Self {
        self.config.rerank.service_type = RerankServiceType::Remote;
        self.config.rerank.service_url = Some(url.into());
        self
    }

    /// Set the heuristic name-match threshold.
    pub fn with_name_similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.identity.name_similarity_threshold = threshold;
        self
    }

    /// Disable the temporal-state and adjacency caches.
    pub fn without_cache(mut self) -> Self {
        self.config.cache.enabled = false;
        self
    }

    /// Set the log level.
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Set the log format.
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.config.logging.format = format;
        self
    }

    /// Configure logging to a file.
    pub fn with_log_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.logging.file = Some(path.as_ref().to_path_buf());
        self
    }

    /// Create a configuration for development.
    ///
    /// Local embeddings and debug-level logging.
    pub fn development() -> Self {
        Self::new()
            .with_local_embeddings(256)
            .with_log_level(LogLevel::Debug)
    }

    /// Create a configuration for automated testing.
    ///
    /// Generous budgets keep tests stable on slow CI machines; logging is quiet.
    pub fn testing() -> Self {
        Self::new()
            .with_local_embeddings(128)
            .with_data_dir(PathBuf::from("./test_data"))
            .with_generator_timeout(Duration::from_secs(2))
            .with_embedding_timeout(Duration::from_secs(2))
            .with_rerank_timeout(Duration::from_secs(2))
            .with_log_level(LogLevel::Warn)
    }

    /// Create a production configuration: JSON logs at Info level.
    pub fn production() -> Self {
        Self::new()
            .with_log_level(LogLevel::Info)
            .with_log_format(LogFormat::Json)
    }

    /// Build the configuration, validating it in the process.
    pub fn build(self) -> Result<LodestarConfig> {
        validation::validate_config(&self.config)?;

        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
