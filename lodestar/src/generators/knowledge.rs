//! Knowledge generator: lexical BM25 plus dense vectors over chunks
//!
//! Queries whose identifiers resolved to documents take the fast path: one exact candidate
//! per document, no lexical or vector search, no embedding.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{CandidateGenerator, Candidate, Evidence, GenerationInput, GeneratorKind, clamp_unit};
use crate::Result;
use crate::config::FusionConfig;
use crate::models::Chunk;
use crate::query::text::tokenize;
use crate::storage::{VectorNamespace, VectorQuery, WorkspaceStore};

#[derive(Debug, Clone)]
pub struct KnowledgeGenerator {
    store: Arc<dyn WorkspaceStore>,
    lexical_weight: f32,
    vector_weight: f32,
}

impl KnowledgeGenerator {
    pub fn new(store: Arc<dyn WorkspaceStore>, fusion: &FusionConfig) -> Self {
        Self {
            store,
            lexical_weight: fusion.knowledge_lexical_weight,
            vector_weight: fusion.knowledge_vector_weight,
        }
    }

    async fn identifier_candidates(&self, input: &GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        let mut candidates = Vec::new();
        for (document_id, chunk_ids) in query.documents() {
            let Some(first) = chunk_ids.first() else {
                continue;
            };
            let Some(chunk) = self.store.get_chunk(&query.workspace_id, first).await? else {
                continue;
            };
            if !input.filters.matches_chunk(&chunk) {
                continue;
            }
            debug!(document_id, chunk_id = %chunk.id, "Identifier fast path hit");
            let mut candidate = Candidate::chunk(&chunk, GeneratorKind::Knowledge)
                .with_evidence(Evidence::Identifier {
                    identifier: chunk.external_id.clone(),
                });
            candidate.scores.knowledge = Some(1.0);
            candidate.exact = true;
            candidates.push(candidate);
        }
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateGenerator for KnowledgeGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Knowledge
    }

    async fn generate(&self, input: GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        let workspace_id = query.workspace_id.as_str();

        if query.has_identifier_hit() {
            let exact = self.identifier_candidates(&input).await?;
            if !exact.is_empty() {
                return Ok(exact);
            }
        }

        // Identifier queries that missed fall back to lexical search on the identifier tokens
        let terms = if query.terms.is_empty() {
            query
                .classification
                .identifiers
                .iter()
                .flat_map(|id| tokenize(id))
                .collect()
        } else {
            query.terms.clone()
        };

        let lexical = if terms.is_empty() {
            Vec::new()
        } else {
            self.store
                .lexical_search(workspace_id, &terms, input.filters, input.limit)
                .await?
        };
        let max_bm25 = lexical.iter().map(|(_, s)| *s).fold(0.0f32, f32::max);
        let mut lexical_scores: HashMap<String, f32> = lexical
            .into_iter()
            .map(|(id, score)| {
                let normalised = if max_bm25 > 0.0 { score / max_bm25 } else { 0.0 };
                (id, normalised)
            })
            .collect();

        let mut vector_scores: HashMap<String, f32> = HashMap::new();
        if let Some(embedding) = &query.embedding {
            let matches = self
                .store
                .search_vectors(VectorQuery {
                    workspace_id,
                    namespace: VectorNamespace::Chunks,
                    view: None,
                    vector: embedding,
                    limit: input.limit,
                    allowed_ids: None,
                })
                .await?;
            for m in matches {
                let entry = vector_scores.entry(m.entity_id).or_insert(0.0);
                *entry = entry.max(clamp_unit(m.score));
            }
        }

        let mut ids: Vec<String> = lexical_scores.keys().cloned().collect();
        ids.extend(
            vector_scores
                .keys()
                .filter(|id| !lexical_scores.contains_key(*id))
                .cloned(),
        );
        ids.sort();
        let chunks = self.store.get_chunks(workspace_id, &ids).await?;

        let term_set: HashSet<&str> = terms.iter().map(String::as_str).collect();
        let candidates = chunks
            .iter()
            .filter(|chunk| input.filters.matches_chunk(chunk))
            .filter_map(|chunk| {
                let lexical = lexical_scores.remove(&chunk.id);
                let vector = vector_scores.get(&chunk.id).copied();
                if lexical.is_none() && vector.is_none_or(|v| v <= 0.0) {
                    return None;
                }
                Some(self.score_chunk(chunk, lexical, vector, &term_set))
            })
            .collect();
        Ok(candidates)
    }
}

impl KnowledgeGenerator {
    fn score_chunk(
        &self,
        chunk: &Chunk,
        lexical: Option<f32>,
        vector: Option<f32>,
        terms: &HashSet<&str>,
    ) -> Candidate {
        let blended = self.lexical_weight * lexical.unwrap_or(0.0)
            + self.vector_weight * vector.unwrap_or(0.0);
        let mut candidate = Candidate::chunk(chunk, GeneratorKind::Knowledge);
        candidate.scores.knowledge = Some(clamp_unit(blended));
        if let Some(vector) = vector {
            candidate = candidate.with_vector_score(vector);
        }
        if lexical.is_some() {
            let mut matched: Vec<String> = tokenize(&chunk.indexed_text())
                .into_iter()
                .filter(|t| terms.contains(t.as_str()))
                .collect();
            matched.sort();
            matched.dedup();
            candidate = candidate.with_evidence(Evidence::Lexical {
                matched_terms: matched,
            });
        }
        candidate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FusionConfig;
    use crate::query::{FixedClock, QueryProcessor, RouterMode, RuleClassifier};
    use crate::storage::{SearchFilters, WorkspaceSnapshot};
    use crate::test_support::{self as ts, WS};
    use std::time::Duration;

    async fn setup(snapshot: WorkspaceSnapshot) -> (QueryProcessor, KnowledgeGenerator) {
        let store = ts::load(snapshot).await;
        let processor = QueryProcessor::new(
            Arc::clone(&store),
            ts::embedder(),
            Arc::new(RuleClassifier::new()),
            Arc::new(FixedClock(ts::now())),
            Duration::from_secs(2),
            0.8,
        );
        (processor, KnowledgeGenerator::new(store, &FusionConfig::default()))
    }

    fn corpus() -> WorkspaceSnapshot {
        let mut snapshot = ts::snapshot();
        snapshot.chunks.push(ts::github_chunk(
            "c1",
            482,
            "Move auth to the gateway",
            "Session validation now happens in the API gateway",
        ));
        snapshot.chunks.push(ts::github_chunk(
            "c2",
            483,
            "Billing retries",
            "Retry failed invoices with backoff",
        ));
        snapshot
    }

    #[tokio::test]
    async fn test_identifier_fast_path_returns_single_exact_candidate() {
        let (processor, generator) = setup(corpus()).await;
        let query = processor.process(WS, "#482", None).await.unwrap();
        let filters = SearchFilters::default();

        let candidates = generator
            .generate(GenerationInput {
                query: &query,
                filters: &filters,
                seeds: &[],
                limit: 50,
            })
            .await
            .unwrap();

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "c1");
        assert!(candidates[0].exact);
        assert_eq!(candidates[0].scores.knowledge, Some(1.0));
        assert!(candidates[0].vector_score.is_none());
    }

    #[tokio::test]
    async fn test_lexical_and_vector_scores_are_normalised() {
        let (processor, generator) = setup(corpus()).await;
        let query = processor
            .process(WS, "gateway session", Some(RouterMode::Knowledge))
            .await
            .unwrap();
        let filters = SearchFilters::default();

        let candidates = generator
            .generate(GenerationInput {
                query: &query,
                filters: &filters,
                seeds: &[],
                limit: 50,
            })
            .await
            .unwrap();

        let top = candidates.iter().find(|c| c.id == "c1").unwrap();
        let knowledge = top.scores.knowledge.unwrap();
        assert!(knowledge > 0.5 && knowledge <= 1.0);
        assert!(matches!(
            top.evidence.first(),
            Some(Evidence::Lexical { matched_terms }) if matched_terms.contains(&"gateway".to_string())
        ));
        for candidate in &candidates {
            let score = candidate.scores.knowledge.unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[tokio::test]
    async fn test_unknown_identifier_falls_back_to_lexical() {
        let (processor, generator) = setup(corpus()).await;
        let query = processor.process(WS, "#999", None).await.unwrap();
        let filters = SearchFilters::default();

        let candidates = generator
            .generate(GenerationInput {
                query: &query,
                filters: &filters,
                seeds: &[],
                limit: 50,
            })
            .await
            .unwrap();
        assert!(candidates.iter().all(|c| !c.exact));
    }
}
