//! The retrieval engine
//!
//! [`RetrievalEngine`] wires the query processor, candidate generators, fusion scorer, rerank
//! stage, hydrator and answer synthesizer into the three external operations: search, batch
//! contents fetch and cited answers (whole or streamed).

use async_stream::try_stream;
use futures::Stream;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{Instrument, debug, info, info_span};

use super::diagnostics::Diagnostics;
use super::hydrator::{self, Hydrated, Hydrator};
use super::synthesizer::{AnswerSynthesizer, ExtractiveSynthesizer};
use super::types::{
    ActorExpertise, AnswerEvent, AnswerRequest, AnswerResponse, ContentItem, ContentRef,
    ContentsRequest, ContentsResponse, Rationale, RelatedItem, SearchRequest, SearchResponse,
    SearchResult,
};
use crate::config::LodestarConfig;
use crate::config::validation::validate_config;
use crate::generators::runner::{all_required_failed, required_generators, run_all, run_generator};
use crate::generators::{
    Candidate, CandidateGenerator, Evidence, GenerationInput, GeneratorKind, GraphGenerator,
    GraphService, KnowledgeGenerator, NeuralGenerator, TemporalGenerator,
};
use crate::identity::{IdentityAdmin, IdentityResolver};
use crate::ml::{self, EmbeddingProvider};
use crate::models::{ContentKind, NodeKind, NodeRef};
use crate::query::{
    Classifier, Clock, ParsedQuery, QueryProcessor, RouterMode, RuleClassifier, SystemClock,
};
use crate::search::{FusionScorer, RerankStage, Reranker, ScoredCandidate, create_reranker};
use crate::storage::{CacheService, WorkspaceStore};
use crate::temporal::TemporalService;
use crate::{LodestarError, Result};

/// Retrieval engine over one workspace store
#[derive(Debug, Clone)]
pub struct RetrievalEngine {
    config: Arc<LodestarConfig>,

    /// Workspace data
    store: Arc<dyn WorkspaceStore>,

    /// Classification, temporal parsing, entity resolution and query embedding
    processor: QueryProcessor,

    knowledge: Arc<dyn CandidateGenerator>,
    neural: Arc<dyn CandidateGenerator>,
    temporal: Arc<dyn CandidateGenerator>,
    graph: Arc<dyn CandidateGenerator>,

    fusion: FusionScorer,
    rerank: RerankStage,
    hydrator: Hydrator,
    synthesizer: Arc<dyn AnswerSynthesizer>,

    /// Temporal state read/write path sharing the engine's cache
    temporal_service: Arc<TemporalService>,

    /// Graph adjacency read/write path sharing the engine's cache
    graph_service: Arc<GraphService>,

    resolver: IdentityResolver,
    admin: IdentityAdmin,
}

/// Builder for [`RetrievalEngine`]
///
/// Only the store is mandatory. Everything else defaults to what the configuration describes:
/// the configured embedding provider and reranker, the rule-based classifier, the system clock
/// and the extractive synthesizer.
#[derive(Debug)]
pub struct RetrievalEngineBuilder {
    config: LodestarConfig,
    store: Option<Arc<dyn WorkspaceStore>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    reranker: Option<Arc<dyn Reranker>>,
    classifier: Option<Arc<dyn Classifier>>,
    clock: Option<Arc<dyn Clock>>,
    synthesizer: Option<Arc<dyn AnswerSynthesizer>>,
    generators: HashMap<GeneratorKind, Arc<dyn CandidateGenerator>>,
}

impl RetrievalEngineBuilder {
    pub fn with_store(mut self, store: Arc<dyn WorkspaceStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn AnswerSynthesizer>) -> Self {
        self.synthesizer = Some(synthesizer);
        self
    }

    /// Replace the built-in generator of the same [`GeneratorKind`]
    pub fn with_generator(mut self, generator: Arc<dyn CandidateGenerator>) -> Self {
        self.generators.insert(generator.kind(), generator);
        self
    }

    pub fn build(mut self) -> Result<RetrievalEngine> {
        validate_config(&self.config)?;
        let config = self.config;
        let store = self.store.ok_or_else(|| {
            LodestarError::Configuration("Retrieval engine needs a workspace store".to_string())
        })?;
        let embedder = match self.embedder {
            Some(embedder) => embedder,
            None => ml::create_embedding_provider(&config.ml.embedding)?,
        };
        let reranker = match self.reranker {
            Some(reranker) => reranker,
            None => create_reranker(&config.rerank, Arc::clone(&embedder))?,
        };

        let cache = Arc::new(CacheService::new(&config.cache));
        let temporal_service = Arc::new(TemporalService::new(Arc::clone(&store), Arc::clone(&cache)));
        let graph_service = Arc::new(GraphService::new(Arc::clone(&store), cache));

        let processor = QueryProcessor::new(
            Arc::clone(&store),
            embedder,
            self.classifier.unwrap_or_else(|| Arc::new(RuleClassifier::new())),
            self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config.retrieval.embedding_timeout,
            config.identity.name_similarity_threshold,
        );

        let mut take = |kind: GeneratorKind, default: Arc<dyn CandidateGenerator>| {
            self.generators.remove(&kind).unwrap_or(default)
        };
        let knowledge = take(
            GeneratorKind::Knowledge,
            Arc::new(KnowledgeGenerator::new(Arc::clone(&store), &config.fusion)),
        );
        let neural = take(
            GeneratorKind::Neural,
            Arc::new(NeuralGenerator::new(
                Arc::clone(&store),
                config.retrieval.actor.clone(),
            )),
        );
        let temporal = take(
            GeneratorKind::Temporal,
            Arc::new(TemporalGenerator::new(Arc::clone(&temporal_service))),
        );
        let graph = take(
            GeneratorKind::Graph,
            Arc::new(GraphGenerator::new(
                Arc::clone(&graph_service),
                Arc::clone(&store),
                config.retrieval.graph.clone(),
            )),
        );

        info!(
            rerank = ?config.rerank.service_type,
            cache = config.cache.enabled,
            "Retrieval engine ready"
        );

        Ok(RetrievalEngine {
            fusion: FusionScorer::new(config.fusion.clone()),
            rerank: RerankStage::new(reranker, config.rerank.clone()),
            hydrator: Hydrator::new(Arc::clone(&store)),
            synthesizer: self
                .synthesizer
                .unwrap_or_else(|| Arc::new(ExtractiveSynthesizer::default())),
            resolver: IdentityResolver::new(Arc::clone(&store), config.identity.clone()),
            admin: IdentityAdmin::new(Arc::clone(&store)),
            config: Arc::new(config),
            store,
            processor,
            knowledge,
            neural,
            temporal,
            graph,
            temporal_service,
            graph_service,
        })
    }
}

/// Graph node an item is addressed by in the relationship graph
fn node_for(kind: ContentKind, id: &str) -> NodeRef {
    let node_kind = match kind {
        ContentKind::Chunk => NodeKind::Chunk,
        ContentKind::Observation => NodeKind::Observation,
        ContentKind::Summary => NodeKind::Summary,
        ContentKind::State => NodeKind::Entity,
    };
    NodeRef::new(node_kind, id)
}

fn content_kind(node: NodeKind) -> Option<ContentKind> {
    match node {
        NodeKind::Chunk => Some(ContentKind::Chunk),
        NodeKind::Observation => Some(ContentKind::Observation),
        NodeKind::Summary => Some(ContentKind::Summary),
        NodeKind::Document | NodeKind::Actor | NodeKind::Entity => None,
    }
}

impl RetrievalEngine {
    pub fn builder(config: LodestarConfig) -> RetrievalEngineBuilder {
        RetrievalEngineBuilder {
            config,
            store: None,
            embedder: None,
            reranker: None,
            classifier: None,
            clock: None,
            synthesizer: None,
            generators: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LodestarConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn WorkspaceStore> {
        &self.store
    }

    /// Identity resolution for incoming source events
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Administrative actor merge and split
    pub fn admin(&self) -> &IdentityAdmin {
        &self.admin
    }

    pub fn temporal(&self) -> &Arc<TemporalService> {
        &self.temporal_service
    }

    pub fn graph(&self) -> &Arc<GraphService> {
        &self.graph_service
    }

    fn generator(&self, kind: GeneratorKind) -> &dyn CandidateGenerator {
        match kind {
            GeneratorKind::Knowledge => self.knowledge.as_ref(),
            GeneratorKind::Neural => self.neural.as_ref(),
            GeneratorKind::Temporal => self.temporal.as_ref(),
            GeneratorKind::Graph => self.graph.as_ref(),
        }
    }

    fn budget(&self, kind: GeneratorKind) -> Duration {
        let retrieval = &self.config.retrieval;
        match kind {
            GeneratorKind::Knowledge => retrieval.knowledge_timeout,
            GeneratorKind::Neural => retrieval.neural_timeout,
            GeneratorKind::Temporal => retrieval.temporal_timeout,
            GeneratorKind::Graph => retrieval.graph_timeout,
        }
    }

    /// Worst-case search latency for `mode` without rerank
    ///
    /// Query embedding, then the slowest required generator, then graph expansion.
    pub fn latency_budget(&self, mode: RouterMode) -> Duration {
        let slowest = required_generators(mode)
            .iter()
            .map(|kind| self.budget(*kind))
            .max()
            .unwrap_or_default();
        self.config.retrieval.embedding_timeout + slowest + self.budget(GeneratorKind::Graph)
    }

    fn effective_limit(&self, requested: Option<usize>) -> Result<usize> {
        let retrieval = &self.config.retrieval;
        match requested {
            Some(0) => Err(LodestarError::Validation(
                "Limit must be at least 1".to_string(),
            )),
            Some(limit) => Ok(limit.min(retrieval.max_limit)),
            None => Ok(retrieval.default_limit.min(retrieval.max_limit)),
        }
    }

    fn require_workspace(workspace_id: &str) -> Result<()> {
        if workspace_id.trim().is_empty() {
            return Err(LodestarError::Validation(
                "Workspace id is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Run a ranked search
    ///
    /// Only fails when the request is invalid or every generator the router mode requires
    /// failed. Any other degradation is reported in the response diagnostics.
    pub async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let span = info_span!(
            "search",
            workspace_id = %request.workspace_id,
            rerank = request.rerank,
        );
        self.execute_search(request).instrument(span).await
    }

    async fn execute_search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let started = Instant::now();
        Self::require_workspace(&request.workspace_id)?;
        let limit = self.effective_limit(request.limit)?;

        let query = self
            .processor
            .process(&request.workspace_id, &request.query, request.mode)
            .await?;
        let mode = query.mode;
        let input = GenerationInput {
            query: &query,
            filters: &request.filters,
            seeds: &[],
            limit: self.config.retrieval.candidate_pool.max(limit),
        };

        let mut jobs: Vec<(&dyn CandidateGenerator, Duration)> = required_generators(mode)
            .iter()
            .map(|kind| (self.generator(*kind), self.budget(*kind)))
            .collect();
        let graph_from_entities = !query.entities.is_empty();
        if graph_from_entities {
            jobs.push((self.graph.as_ref(), self.budget(GeneratorKind::Graph)));
        }

        let mut outcomes = run_all(&jobs, input).await;
        if all_required_failed(mode, &outcomes) {
            return Err(LodestarError::AllGeneratorsFailed {
                mode: mode.to_string(),
            });
        }
        let mut candidates: Vec<Candidate> = outcomes
            .iter_mut()
            .flat_map(|o| std::mem::take(&mut o.candidates))
            .collect();

        // Without resolved entities the graph expands from the strongest early candidates
        let seed_count = self.config.retrieval.graph.seed_count;
        if !graph_from_entities && seed_count > 0 && !candidates.is_empty() {
            let seeds: Vec<NodeRef> = self
                .fusion
                .fuse(mode, candidates.clone(), query.now)
                .iter()
                .take(seed_count)
                .map(|c| c.candidate.node())
                .collect();
            let mut outcome = run_generator(
                self.graph.as_ref(),
                GenerationInput {
                    seeds: &seeds,
                    ..input
                },
                self.budget(GeneratorKind::Graph),
            )
            .await;
            candidates.append(&mut outcome.candidates);
            outcomes.push(outcome);
        }
        if let Some(window) = query.temporal.window {
            candidates.retain(|c| {
                c.generator != GeneratorKind::Graph
                    || c.kind == ContentKind::State
                    || c.occurred_at.is_none_or(|at| window.contains(at))
            });
        }

        let mut ranked = self.fusion.fuse(mode, candidates, query.now);
        let fused = ranked.len();

        let hydrate_count = if request.rerank {
            limit.max(self.config.rerank.top_k)
        } else {
            limit
        };
        ranked.truncate(hydrate_count);
        let refs: Vec<(String, ContentKind)> = ranked
            .iter()
            .map(|c| (c.candidate.id.clone(), c.candidate.kind))
            .collect();
        let mut items = self.hydrator.hydrate(&request.workspace_id, &refs).await?;
        ranked.retain(|c| items.contains_key(c.id()));

        let texts: HashMap<String, String> = items
            .iter()
            .map(|(id, item)| (id.clone(), item.rerank_text()))
            .collect();
        let (mut ranked, rerank) = self
            .rerank
            .apply(&query.text, ranked, &texts, request.rerank)
            .await;
        ranked.truncate(limit);

        let results: Vec<SearchResult> = ranked
            .iter()
            .filter_map(|scored| {
                let item = items.remove(scored.id())?;
                Some(self.assemble(&query, scored, item, request.explain))
            })
            .collect();

        let mut diagnostics = Diagnostics {
            mode,
            classified_mode: query.classification.mode,
            confidence: query.classification.confidence,
            matched_rule: query.classification.matched_rule.clone(),
            ambiguous: query.classification.ambiguous,
            embedding: query.embedding_status.clone(),
            generators: outcomes.into_iter().map(|o| o.report).collect(),
            rerank,
            codes: Vec::new(),
            candidates: fused,
            total_ms: started.elapsed().as_millis() as u64,
        };
        diagnostics.collect_codes();

        info!(
            %mode,
            results = results.len(),
            candidates = fused,
            latency_ms = diagnostics.total_ms,
            codes = ?diagnostics.codes,
            "Search completed"
        );
        Ok(SearchResponse {
            results,
            diagnostics,
        })
    }

    fn assemble(
        &self,
        query: &ParsedQuery,
        scored: &ScoredCandidate,
        item: Hydrated,
        explain: bool,
    ) -> SearchResult {
        let highlights = hydrator::highlights(&item, &query.terms);
        let snippet = hydrator::snippet(
            &item.content,
            &highlights,
            self.config.retrieval.snippet_chars,
        );
        let rationale = self.rationale(scored, explain);
        item.into_result(scored.score, snippet, highlights, rationale)
    }

    /// Explanation of a result's rank
    ///
    /// Attached when explicitly requested, or when a graph, temporal or actor signal
    /// contributed at least the materiality threshold.
    fn rationale(&self, scored: &ScoredCandidate, explain: bool) -> Option<Rationale> {
        let threshold = self.config.retrieval.rationale_threshold;
        let c = &scored.contributions;
        let material = |value: f32| value > 0.0 && value >= threshold;
        let graph = material(c.graph);
        let temporal = material(c.temporal);
        let actor = material(c.actor);
        if !(explain || graph || temporal || actor) {
            return None;
        }

        let mut signals: Vec<(&str, f32)> = [
            ("knowledge", c.knowledge),
            ("neural", c.neural),
            ("temporal", c.temporal),
            ("actor", c.actor),
            ("graph", c.graph),
            ("recency", c.recency),
            ("importance", c.importance),
        ]
        .into_iter()
        .filter(|(_, value)| material(*value))
        .collect();
        signals.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let mut rationale = Rationale {
            signals: signals.into_iter().map(|(name, _)| name.to_string()).collect(),
            contributions: explain.then_some(*c),
            ..Default::default()
        };
        if scored.candidate.exact {
            rationale.signals.insert(0, "identifier".to_string());
        }

        let mut terms = BTreeSet::new();
        for evidence in &scored.candidate.evidence {
            match evidence {
                Evidence::GraphPath { path, .. } if graph || explain => {
                    if rationale.graph_path.is_none() {
                        rationale.graph_path = Some(path.clone());
                    }
                }
                Evidence::Temporal {
                    expression,
                    state,
                    window,
                    ..
                } if temporal || explain => {
                    if rationale.temporal.is_none() {
                        rationale.temporal = state
                            .clone()
                            .or_else(|| expression.clone())
                            .or_else(|| {
                                window.map(|w| {
                                    format!("{} to {}", w.start.to_rfc3339(), w.end.to_rfc3339())
                                })
                            });
                    }
                }
                Evidence::Actor {
                    actor_id,
                    topic,
                    weight,
                } if actor || explain => {
                    let stronger = rationale.actor.as_ref().is_none_or(|a| *weight > a.weight);
                    if stronger {
                        rationale.actor = Some(ActorExpertise {
                            actor_id: actor_id.clone(),
                            topic: topic.clone(),
                            weight: *weight,
                        });
                    }
                }
                Evidence::View { view, .. } => {
                    if rationale.matched_view.is_none() {
                        rationale.matched_view = Some(view.clone());
                    }
                }
                Evidence::Lexical { matched_terms } => {
                    terms.extend(matched_terms.iter().cloned());
                }
                _ => {}
            }
        }
        rationale.matched_terms = terms.into_iter().collect();
        Some(rationale)
    }

    /// Batch fetch by internal id or source address
    pub async fn contents(&self, request: ContentsRequest) -> Result<ContentsResponse> {
        Self::require_workspace(&request.workspace_id)?;
        let workspace_id = request.workspace_id.as_str();

        let mut refs: Vec<(String, ContentKind)> = Vec::new();
        let mut missing = Vec::new();
        for content_ref in &request.refs {
            let resolved = self.resolve_ref(workspace_id, content_ref).await?;
            if resolved.is_empty() {
                missing.push(match content_ref {
                    ContentRef::Id { id } => id.clone(),
                    ContentRef::External {
                        source_type,
                        external_id,
                    } => format!("{}:{}", source_type, external_id),
                });
            }
            for entry in resolved {
                if !refs.contains(&entry) {
                    refs.push(entry);
                }
            }
        }

        let mut hydrated = self.hydrator.hydrate(workspace_id, &refs).await?;
        let mut items: Vec<ContentItem> = Vec::with_capacity(refs.len());
        for (id, kind) in &refs {
            let Some(item) = hydrated.remove(id) else {
                continue;
            };
            let related = if request.include_related {
                self.related(workspace_id, &node_for(*kind, id)).await?
            } else {
                Vec::new()
            };
            items.push(item.into_item(related));
        }

        debug!(
            requested = request.refs.len(),
            items = items.len(),
            missing = missing.len(),
            "Contents fetched"
        );
        Ok(ContentsResponse { items, missing })
    }

    async fn resolve_ref(
        &self,
        workspace_id: &str,
        content_ref: &ContentRef,
    ) -> Result<Vec<(String, ContentKind)>> {
        match content_ref {
            ContentRef::Id { id } => {
                let found = if self.store.get_chunk(workspace_id, id).await?.is_some() {
                    Some(ContentKind::Chunk)
                } else if self.store.get_observation(workspace_id, id).await?.is_some() {
                    Some(ContentKind::Observation)
                } else if !self
                    .store
                    .get_summaries(workspace_id, std::slice::from_ref(id))
                    .await?
                    .is_empty()
                {
                    Some(ContentKind::Summary)
                } else if self.store.get_state(workspace_id, id).await?.is_some() {
                    Some(ContentKind::State)
                } else {
                    None
                };
                Ok(found.map(|kind| vec![(id.clone(), kind)]).unwrap_or_default())
            }
            ContentRef::External {
                source_type,
                external_id,
            } => {
                let chunks = self
                    .store
                    .find_chunks_by_external_id(workspace_id, *source_type, external_id)
                    .await?;
                if !chunks.is_empty() {
                    return Ok(chunks
                        .into_iter()
                        .map(|c| (c.id, ContentKind::Chunk))
                        .collect());
                }
                Ok(self
                    .store
                    .find_observations_by_external_id(workspace_id, *source_type, external_id)
                    .await?
                    .into_iter()
                    .map(|o| (o.id, ContentKind::Observation))
                    .collect())
            }
        }
    }

    /// One-hop neighbours of `node`, strongest first
    async fn related(&self, workspace_id: &str, node: &NodeRef) -> Result<Vec<RelatedItem>> {
        let edges = self.graph_service.neighbors(workspace_id, node).await?;
        let mut related: Vec<RelatedItem> = edges
            .iter()
            .filter_map(|edge| {
                let other = edge.other_end(node)?;
                Some(RelatedItem {
                    id: other.id.clone(),
                    kind: other.kind,
                    relation: edge.relation,
                    confidence: edge.confidence,
                    title: None,
                })
            })
            .collect();

        let refs: Vec<(String, ContentKind)> = related
            .iter()
            .filter_map(|r| content_kind(r.kind).map(|kind| (r.id.clone(), kind)))
            .collect();
        let titles = self.hydrator.hydrate(workspace_id, &refs).await?;
        for item in &mut related {
            item.title = match item.kind {
                NodeKind::Actor => self
                    .store
                    .get_actor(workspace_id, &item.id)
                    .await?
                    .map(|a| a.display_name),
                _ => titles.get(&item.id).map(|h| h.title.clone()),
            };
        }

        related.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(related)
    }

    /// Hybrid, reranked search followed by a cited answer
    pub async fn answer(&self, request: AnswerRequest) -> Result<AnswerResponse> {
        let response = self.search(request.to_search()).await?;
        let synthesis = self
            .synthesizer
            .synthesize(&request.query, &response.results)
            .await?;
        Ok(AnswerResponse {
            answer: synthesis.text(),
            citations: synthesis.citations,
            sources: response.results,
            diagnostics: response.diagnostics,
        })
    }

    /// Like [`RetrievalEngine::answer`], delivered incrementally
    ///
    /// Emits the ranked sources first, then the answer text piece by piece, then the citations
    /// and diagnostics. Dropping the stream cancels the underlying search.
    pub fn answer_stream(
        &self,
        request: AnswerRequest,
    ) -> impl Stream<Item = Result<AnswerEvent>> + Send + use<> {
        let engine = self.clone();
        try_stream! {
            let response = engine.search(request.to_search()).await?;
            yield AnswerEvent::Sources {
                sources: response.results.clone(),
            };

            let synthesis = engine
                .synthesizer
                .synthesize(&request.query, &response.results)
                .await?;
            for text in synthesis.segments {
                yield AnswerEvent::Delta { text };
            }
            yield AnswerEvent::Done {
                citations: synthesis.citations,
                diagnostics: response.diagnostics,
            };
        }
    }
}
