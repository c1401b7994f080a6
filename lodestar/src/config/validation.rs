//! Configuration validation utilities.

use super::ConfigError;
use super::models::*;
use std::time::Duration;

const WEIGHT_SUM_TOLERANCE: f32 = 1e-4;

/// Validate the entire configuration.
pub fn validate_config(config: &LodestarConfig) -> Result<(), ConfigError> {
    validate_retrieval_config(&config.retrieval)?;
    validate_fusion_config(&config.fusion)?;
    validate_rerank_config(&config.rerank)?;
    validate_unit_interval(
        "identity.name_similarity_threshold",
        config.identity.name_similarity_threshold,
    )?;
    validate_storage_config(&config.storage)?;
    validate_ml_config(&config.ml)?;

    Ok(())
}

/// Validate one fusion weight row.
pub fn validate_weights(mode: &str, weights: &FusionWeights) -> Result<(), ConfigError> {
    if weights.as_array().iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(ConfigError::ValidationError(format!(
            "Fusion weights for mode '{}' must be finite and non-negative",
            mode
        )));
    }
    let sum = weights.sum();
    if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::ValidationError(format!(
            "Fusion weights for mode '{}' sum to {:.4}, expected 1.0",
            mode, sum
        )));
    }
    Ok(())
}

fn validate_unit_interval(name: &str, value: f32) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{} must be within [0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_timeout(name: &str, timeout: Duration) -> Result<(), ConfigError> {
    if timeout.is_zero() {
        return Err(ConfigError::ValidationError(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

fn validate_retrieval_config(config: &RetrievalConfig) -> Result<(), ConfigError> {
    if config.default_limit == 0 || config.default_limit > config.max_limit {
        return Err(ConfigError::ValidationError(
            "retrieval.default_limit must be between 1 and retrieval.max_limit".to_string(),
        ));
    }
    if config.candidate_pool < config.max_limit {
        return Err(ConfigError::ValidationError(
            "retrieval.candidate_pool must be at least retrieval.max_limit".to_string(),
        ));
    }

    validate_timeout("retrieval.knowledge_timeout", config.knowledge_timeout)?;
    validate_timeout("retrieval.neural_timeout", config.neural_timeout)?;
    validate_timeout("retrieval.temporal_timeout", config.temporal_timeout)?;
    validate_timeout("retrieval.graph_timeout", config.graph_timeout)?;
    validate_timeout("retrieval.embedding_timeout", config.embedding_timeout)?;

    let graph = &config.graph;
    if graph.max_hops == 0 || graph.max_hops > 2 {
        return Err(ConfigError::ValidationError(format!(
            "retrieval.graph.max_hops must be 1 or 2, got {}",
            graph.max_hops
        )));
    }
    if graph.hop_factors.len() < graph.max_hops {
        return Err(ConfigError::ValidationError(
            "retrieval.graph.hop_factors needs one factor per hop".to_string(),
        ));
    }
    for factor in &graph.hop_factors {
        validate_unit_interval("retrieval.graph.hop_factors", *factor)?;
    }
    if graph.hop_factors.windows(2).any(|pair| pair[1] >= pair[0]) {
        return Err(ConfigError::ValidationError(
            "retrieval.graph.hop_factors must strictly decrease with distance".to_string(),
        ));
    }
    if graph.max_fan_out == 0 {
        return Err(ConfigError::ValidationError(
            "retrieval.graph.max_fan_out must be greater than zero".to_string(),
        ));
    }

    validate_unit_interval("retrieval.rationale_threshold", config.rationale_threshold)?;
    Ok(())
}

fn validate_fusion_config(config: &FusionConfig) -> Result<(), ConfigError> {
    for (mode, weights) in config.weights.rows() {
        validate_weights(mode, weights)?;
    }

    if !config.recency_half_life_hours.is_finite() || config.recency_half_life_hours <= 0.0 {
        return Err(ConfigError::ValidationError(
            "fusion.recency_half_life_hours must be positive".to_string(),
        ));
    }

    let blend = config.knowledge_lexical_weight + config.knowledge_vector_weight;
    if config.knowledge_lexical_weight < 0.0
        || config.knowledge_vector_weight < 0.0
        || (blend - 1.0).abs() > WEIGHT_SUM_TOLERANCE
    {
        return Err(ConfigError::ValidationError(
            "fusion knowledge lexical/vector weights must be non-negative and sum to 1.0"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_rerank_config(config: &RerankConfig) -> Result<(), ConfigError> {
    if config.top_k == 0 {
        return Err(ConfigError::ValidationError(
            "rerank.top_k must be greater than zero".to_string(),
        ));
    }
    validate_timeout("rerank.timeout", config.timeout)?;

    let blend = &config.blend;
    for value in [blend.rerank, blend.vector, blend.recency, blend.importance] {
        validate_unit_interval("rerank.blend", value)?;
    }
    if (blend.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::ValidationError(format!(
            "rerank.blend sums to {:.4}, expected 1.0",
            blend.sum()
        )));
    }

    if config.service_type == RerankServiceType::Remote && !has_url(&config.service_url) {
        return Err(ConfigError::ValidationError(
            "Service URL is required for the remote rerank service".to_string(),
        ));
    }
    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.data_dir.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "Data directory cannot be empty".to_string(),
        ));
    }
    if let Some(snapshot) = &config.snapshot_file
        && snapshot.as_os_str().is_empty()
    {
        return Err(ConfigError::ValidationError(
            "Snapshot file path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_ml_config(config: &MLConfig) -> Result<(), ConfigError> {
    let embedding = &config.embedding;

    if embedding.dimensions == 0 {
        return Err(ConfigError::ValidationError(
            "Embedding dimensions must be greater than zero".to_string(),
        ));
    }
    if embedding.model_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Embedding model name cannot be empty".to_string(),
        ));
    }

    match (&embedding.model_type, &embedding.service_type) {
        (EmbeddingModelType::Hashing, EmbeddingServiceType::Remote) => {
            Err(ConfigError::ValidationError(
                "Hashing embeddings are computed locally and cannot use a remote service"
                    .to_string(),
            ))
        }
        (EmbeddingModelType::OpenAI | EmbeddingModelType::Custom, EmbeddingServiceType::Local) => {
            Err(ConfigError::ValidationError(format!(
                "Embedding model type {:?} requires a remote service",
                embedding.model_type
            )))
        }
        (_, EmbeddingServiceType::Remote) if !has_url(&embedding.service_url) => {
            Err(ConfigError::ValidationError(
                "Service URL is required for a remote embedding service".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

fn has_url(url: &Option<String>) -> bool {
    url.as_deref().is_some_and(|url| !url.trim().is_empty())
}
