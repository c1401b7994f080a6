//! Reranking of the fused top-K
//!
//! A [`Reranker`] scores (query, document) pairs. The [`RerankStage`] blends that score with the
//! candidate's vector similarity, recency and importance, re-sorts the top-K and leaves the tail
//! untouched. Reranking is best-effort: any failure or a missed budget keeps the fused order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};

use super::fusion::{ScoredCandidate, rank_order};
use crate::LodestarError;
use crate::config::{RerankBlend, RerankConfig, RerankServiceType};
use crate::generators::clamp_unit;
use crate::ml::{EmbeddingProvider, MLError, Result};
use crate::query::text::tokenize;
use crate::storage::models::cosine_similarity;

/// Text handed to the reranker for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct RerankDocument {
    pub id: String,
    pub text: String,
}

/// Scores query/document pairs; one score per document, in input order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Reranker: Send + Sync + Debug {
    async fn score(&self, query: &str, documents: &[RerankDocument]) -> Result<Vec<f32>>;
}

/// In-process cross-encoder stand-in: cosine of embeddings blended with query-term overlap
#[derive(Debug, Clone)]
pub struct VectorCrossEncoder {
    embedder: Arc<dyn EmbeddingProvider>,
}

impl VectorCrossEncoder {
    const COSINE_WEIGHT: f32 = 0.7;
    const OVERLAP_WEIGHT: f32 = 0.3;

    pub fn new(embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { embedder }
    }

    fn overlap(query_terms: &HashSet<String>, text: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc_terms: HashSet<String> = tokenize(text).into_iter().collect();
        query_terms.intersection(&doc_terms).count() as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for VectorCrossEncoder {
    async fn score(&self, query: &str, documents: &[RerankDocument]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut texts = Vec::with_capacity(documents.len() + 1);
        texts.push(query.to_string());
        texts.extend(documents.iter().map(|d| d.text.clone()));

        let vectors = self.embedder.embed_batch(&texts).await?;
        let Some((query_vector, doc_vectors)) = vectors.split_first() else {
            return Err(MLError::rerank("Embedding provider returned no vectors"));
        };
        if doc_vectors.len() != documents.len() {
            return Err(MLError::rerank(format!(
                "Expected {} document vectors, received {}",
                documents.len(),
                doc_vectors.len()
            )));
        }

        let query_terms: HashSet<String> = tokenize(query).into_iter().collect();
        Ok(documents
            .iter()
            .zip(doc_vectors)
            .map(|(doc, vector)| {
                let cosine = clamp_unit(cosine_similarity(query_vector, vector));
                Self::COSINE_WEIGHT * cosine
                    + Self::OVERLAP_WEIGHT * Self::overlap(&query_terms, &doc.text)
            })
            .collect())
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: Vec<&'a str>,
    top_n: usize,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

#[derive(Debug, Deserialize)]
struct RerankResult {
    index: usize,
    relevance_score: f32,
}

/// Calls a Cohere-style `POST {base_url}/rerank` endpoint
#[derive(Debug, Clone)]
pub struct RemoteReranker {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl RemoteReranker {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }
}

#[async_trait]
impl Reranker for RemoteReranker {
    async fn score(&self, query: &str, documents: &[RerankDocument]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let mut request = self
            .client
            .post(format!("{}/rerank", self.base_url))
            .json(&RerankRequest {
                model: &self.model,
                query,
                documents: documents.iter().map(|d| d.text.as_str()).collect(),
                top_n: documents.len(),
            });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body: RerankResponse = request.send().await?.error_for_status()?.json().await?;
        let mut scores = vec![0.0; documents.len()];
        for result in body.results {
            let slot = scores.get_mut(result.index).ok_or_else(|| {
                MLError::rerank(format!("Result index {} out of range", result.index))
            })?;
            *slot = result.relevance_score;
        }
        Ok(scores)
    }
}

/// Build the reranker described by configuration
pub fn create_reranker(
    config: &RerankConfig,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<Arc<dyn Reranker>> {
    match config.service_type {
        RerankServiceType::Vector => Ok(Arc::new(VectorCrossEncoder::new(embedder))),
        RerankServiceType::Remote => {
            let url = config.service_url.as_deref().ok_or_else(|| {
                MLError::configuration("Remote rerank service requires a service URL")
            })?;
            tracing::info!(url, model = %config.model_name, "Using remote rerank service");
            Ok(Arc::new(RemoteReranker::new(
                url,
                config.model_name.clone(),
                config.api_key.clone(),
                config.timeout,
            )?))
        }
    }
}

/// What happened to the rerank step of a query
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RerankStatus {
    NotRequested,
    /// Too few candidates to be worth it
    Skipped { candidates: usize },
    Applied { reranked: usize },
    /// The reranker failed or missed its budget; fused order kept
    Unavailable { message: String },
}

#[derive(Debug, Clone)]
pub struct RerankStage {
    reranker: Arc<dyn Reranker>,
    config: RerankConfig,
}

impl RerankStage {
    pub fn new(reranker: Arc<dyn Reranker>, config: RerankConfig) -> Self {
        Self { reranker, config }
    }

    fn blend(blend: &RerankBlend, rerank: f32, candidate: &ScoredCandidate) -> f32 {
        clamp_unit(
            blend.rerank * clamp_unit(rerank)
                + blend.vector * candidate.candidate.vector_score.unwrap_or(0.0)
                + blend.recency * candidate.recency
                + blend.importance * clamp_unit(candidate.candidate.importance),
        )
    }

    /// Rerank the top-K of `ranked` using `texts` (candidate id to document text)
    pub async fn apply(
        &self,
        query: &str,
        mut ranked: Vec<ScoredCandidate>,
        texts: &HashMap<String, String>,
        requested: bool,
    ) -> (Vec<ScoredCandidate>, RerankStatus) {
        if !requested {
            return (ranked, RerankStatus::NotRequested);
        }
        if ranked.len() <= self.config.min_candidates {
            debug!(
                candidates = ranked.len(),
                min = self.config.min_candidates,
                "Rerank skipped"
            );
            let candidates = ranked.len();
            return (ranked, RerankStatus::Skipped { candidates });
        }

        let top_k = self.config.top_k.min(ranked.len());
        let documents: Vec<RerankDocument> = ranked[..top_k]
            .iter()
            .map(|c| RerankDocument {
                id: c.candidate.id.clone(),
                text: texts.get(&c.candidate.id).cloned().unwrap_or_default(),
            })
            .collect();

        let span = info_span!("rerank", candidates = top_k);
        let result = tokio::time::timeout(self.config.timeout, self.reranker.score(query, &documents))
            .instrument(span)
            .await;

        let failure = match result {
            Ok(Ok(scores)) if scores.len() == top_k => {
                for (candidate, rerank) in ranked[..top_k].iter_mut().zip(scores) {
                    if !candidate.candidate.exact {
                        candidate.score = Self::blend(&self.config.blend, rerank, candidate);
                    }
                }
                // Blended head scores and fused tail scores share one ordering
                ranked.sort_by(rank_order);
                debug!(reranked = top_k, "Rerank applied");
                return (ranked, RerankStatus::Applied { reranked: top_k });
            }
            Ok(Ok(scores)) => format!("expected {} scores, received {}", top_k, scores.len()),
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "timed out after {}ms",
                self.config.timeout.as_millis()
            ),
        };

        let err = LodestarError::RerankUnavailable(failure);
        warn!(error = %err, "Rerank skipped; keeping fused order");
        (
            ranked,
            RerankStatus::Unavailable {
                message: err.to_string(),
            },
        )
    }
}
