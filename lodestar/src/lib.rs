//! # Lodestar
//!
//! Retrieval and ranking engine for a workspace knowledge platform. Lodestar answers
//! natural-language queries against two indexed categories:
//!
//! - **Knowledge**: chunked source documents (code, docs, tickets) searched lexically (BM25)
//!   and by dense vectors.
//! - **Neural memory**: atomic observations, window summaries and actor profiles.
//!
//! A query is classified into a router mode, fanned out to the candidate generators that mode
//! needs (knowledge, neural, temporal, graph), fused into one ranking, optionally reranked and
//! hydrated into provenance-bearing results.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lodestar::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ConfigBuilder::new().with_local_embeddings(256).build()?;
//!     let engine = init(config).await?;
//!
//!     let response = engine
//!         .search(SearchRequest::new("acme", "why did we move auth to the gateway"))
//!         .await?;
//!
//!     for result in response.results {
//!         println!("{:.3} {} {}", result.score, result.result_type, result.title);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **Query**: deterministic rule-based classification, temporal parsing, entity resolution
//! - **Generators**: scatter-gather with independent per-generator timeouts
//! - **Fusion**: mode-specific weight tables that always sum to 1.0
//! - **Identity**: tiered actor resolution and transactional administrative merge/split
//!
//! Storage, embedding, reranking and answer synthesis sit behind traits so each collaborator
//! can be swapped (or stubbed in tests).

pub mod config;
pub mod core;
pub mod generators;
pub mod identity;
pub mod logging;
pub mod ml;
pub mod models;
pub mod query;
pub mod search;
pub mod storage;
pub mod temporal;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;

/// The prelude re-exports commonly used types for convenience
pub mod prelude {
    pub use crate::{init, init_with_defaults, init_with_store};

    pub use crate::config::{ConfigBuilder, ConfigLoader, LodestarConfig, LogLevel};

    pub use crate::core::{
        AnswerEvent, AnswerRequest, AnswerResponse, ContentRef, ContentsRequest, RetrievalEngine,
        SearchRequest, SearchResponse, SearchResult,
    };

    pub use crate::models::{
        Chunk, GraphEdge, Observation, ObservationType, SourceMetadata, SourceType, Summary,
        TemporalState,
    };

    pub use crate::query::RouterMode;
    pub use crate::storage::filters::{DateRange, SearchFilters};

    pub use crate::storage::{InMemoryStore, StorageError, WorkspaceStore};

    pub use crate::{LodestarError, Result};
}

/// Current library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Error type for Lodestar operations
#[derive(Debug, thiserror::Error)]
pub enum LodestarError {
    /// Error during storage operations
    #[error("Storage error: {0}")]
    Storage(String),

    /// Error from an embedding or rerank provider
    #[error("ML error: {0}")]
    ML(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Logging error
    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LogError),

    /// A candidate generator exceeded its time budget
    #[error("Generator '{generator}' timed out after {budget_ms}ms")]
    GeneratorTimeout { generator: String, budget_ms: u64 },

    /// A candidate generator failed
    #[error("Generator '{generator}' failed: {message}")]
    GeneratorError { generator: String, message: String },

    /// Every generator the router mode requires failed
    #[error("All generators required by mode '{mode}' failed; no partial results available")]
    AllGeneratorsFailed { mode: String },

    /// The rerank service could not produce scores
    #[error("Rerank unavailable: {0}")]
    RerankUnavailable(String),

    /// A concurrent identity insert won the uniqueness race and the retry could not read it back
    #[error("Identity conflict for ({source_type}, {source_id}) in workspace {workspace_id}")]
    IdentityConflict {
        workspace_id: String,
        source_type: String,
        source_id: String,
    },

    /// Another merge/split holds one of the actors; the caller should retry
    #[error("Actor {actor_id} is locked by a concurrent merge or split. Retry the operation")]
    MergeConflict { actor_id: String },

    /// Invalid input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Empty search query
    #[error("Search query cannot be empty")]
    EmptySearchQuery,

    /// Other unclassified errors
    #[error("{0}")]
    Other(String),
}

impl From<crate::config::ConfigError> for LodestarError {
    fn from(err: crate::config::ConfigError) -> Self {
        LodestarError::Configuration(err.to_string())
    }
}

impl From<crate::ml::MLError> for LodestarError {
    fn from(err: crate::ml::MLError) -> Self {
        LodestarError::ML(err.to_string())
    }
}

/// Result type for Lodestar operations
pub type Result<T> = std::result::Result<T, LodestarError>;

/// Initialize Lodestar with default configuration and an empty in-memory store
pub async fn init_with_defaults() -> Result<core::RetrievalEngine> {
    let config = config::ConfigBuilder::new().build()?;
    init(config).await
}

/// Initialize Lodestar from configuration
///
/// Installs logging, builds the embedding provider, creates an in-memory workspace store and
/// loads the configured snapshot file into it (if any).
///
/// # Examples
///
/// ```rust,no_run
/// use lodestar::prelude::*;
///
/// async fn example() -> Result<()> {
///     let config = ConfigBuilder::new()
///         .with_local_embeddings(128)
///         .with_snapshot_file("./workspace.json")
///         .build()?;
///     let engine = init(config).await?;
///     Ok(())
/// }
/// ```
pub async fn init(config: config::LodestarConfig) -> Result<core::RetrievalEngine> {
    // Ignore errors if tracing is already initialized
    let _ = logging::init(&config.logging);

    let embedder = ml::create_embedding_provider(&config.ml.embedding)?;
    let store = Arc::new(storage::InMemoryStore::new());

    if let Some(path) = &config.storage.snapshot_file {
        let snapshot = storage::snapshot::WorkspaceSnapshot::from_file(path)?;
        let loaded = snapshot.load_into(store.as_ref(), embedder.as_ref()).await?;
        tracing::info!(
            path = %path.display(),
            chunks = loaded.chunks,
            observations = loaded.observations,
            "Workspace snapshot loaded"
        );
    }

    init_with_store(config, store, embedder)
}

/// Initialize Lodestar over an existing store and embedding provider
pub fn init_with_store(
    config: config::LodestarConfig,
    store: Arc<dyn storage::WorkspaceStore>,
    embedder: Arc<dyn ml::EmbeddingProvider>,
) -> Result<core::RetrievalEngine> {
    let reranker = search::rerank::create_reranker(&config.rerank, Arc::clone(&embedder))?;
    core::RetrievalEngine::builder(config)
        .with_store(store)
        .with_embedder(embedder)
        .with_reranker(reranker)
        .build()
}
