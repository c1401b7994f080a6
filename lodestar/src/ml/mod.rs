//! Embedding providers
//!
//! The engine only sees [`EmbeddingProvider`]. Two implementations ship with the crate:
//!
//! - [`HashingEmbedder`]: deterministic feature hashing, computed in process
//! - [`RemoteEmbedder`]: any OpenAI-compatible `/embeddings` endpoint

pub mod embedding;
pub mod error;
pub mod remote;

use std::sync::Arc;

use crate::config::{EmbeddingConfig, EmbeddingServiceType};

pub use embedding::{EmbeddingProvider, EmbeddingVector, HashingEmbedder, normalize};
pub use error::{MLError, Result};
pub use remote::RemoteEmbedder;

/// Build the embedding provider described by configuration
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.service_type {
        EmbeddingServiceType::Local => Ok(Arc::new(HashingEmbedder::new(config.dimensions)?)),
        EmbeddingServiceType::Remote => {
            let url = config.service_url.as_deref().ok_or_else(|| {
                MLError::configuration("Remote embedding service requires a service URL")
            })?;
            tracing::info!(url, model = %config.model_name, "Using remote embedding service");
            Ok(Arc::new(RemoteEmbedder::new(
                url,
                config.model_name.clone(),
                config.api_key.clone(),
                config.dimensions,
                config.request_timeout,
            )?))
        }
    }
}
