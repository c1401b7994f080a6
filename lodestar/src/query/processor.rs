//! Query processing: classify, parse time, resolve entities, embed
//!
//! The processor turns raw query text into a [`ParsedQuery`] carrying everything the candidate
//! generators need. It never rejects a non-empty query: resolution or embedding failures only
//! leave the corresponding fields empty.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::RouterMode;
use super::classifier::{Classification, Classifier, strip_actor_markers};
use super::similarity::name_similarity;
use super::temporal::{self, Clock, TemporalContext};
use super::text::{tokenize, words};
use crate::ml::EmbeddingProvider;
use crate::models::{NodeKind, NodeRef, ObservationType};
use crate::storage::WorkspaceStore;
use crate::{LodestarError, Result};

/// An entity named by the query and found in the workspace
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolvedEntity {
    /// A document addressed by a literal identifier
    Document {
        document_id: String,
        identifier: String,
        /// Chunk ids of the document, first chunk first
        chunk_ids: Vec<String>,
    },
    /// An actor named by @mention or "by X"
    Actor {
        actor_id: String,
        name: String,
        confidence: f32,
    },
    /// An entity with recorded temporal state
    Entity {
        entity_type: String,
        entity_id: String,
    },
}

impl ResolvedEntity {
    /// Graph node for expansion
    pub fn node(&self) -> NodeRef {
        match self {
            Self::Document { document_id, .. } => NodeRef::new(NodeKind::Document, document_id),
            Self::Actor { actor_id, .. } => NodeRef::new(NodeKind::Actor, actor_id),
            Self::Entity { entity_id, .. } => NodeRef::new(NodeKind::Entity, entity_id),
        }
    }
}

/// Whether the query vector was produced
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum EmbeddingStatus {
    Computed,
    /// Not needed: identifier fast path or nothing topical to embed
    Skipped,
    /// The provider failed or exceeded its budget
    Unavailable(String),
}

/// Everything the generators need to know about one query
#[derive(Debug, Clone, Serialize)]
pub struct ParsedQuery {
    pub workspace_id: String,
    pub text: String,
    pub mode: RouterMode,
    pub classification: Classification,
    pub temporal: TemporalContext,
    /// Observation types named in the query ("incidents", "decisions")
    pub type_hints: Vec<ObservationType>,
    /// Topic terms: tokens left after removing temporal, actor and type markers
    pub terms: Vec<String>,
    pub entities: Vec<ResolvedEntity>,
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub embedding_status: EmbeddingStatus,
    /// Reference time the query was evaluated at
    pub now: DateTime<Utc>,
}

impl ParsedQuery {
    /// Whether the query names literal identifiers and at least one resolved to a document
    pub fn has_identifier_hit(&self) -> bool {
        self.entities
            .iter()
            .any(|e| matches!(e, ResolvedEntity::Document { .. }))
    }

    pub fn documents(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entities.iter().filter_map(|e| match e {
            ResolvedEntity::Document {
                document_id,
                chunk_ids,
                ..
            } => Some((document_id.as_str(), chunk_ids.as_slice())),
            _ => None,
        })
    }

    pub fn actors(&self) -> impl Iterator<Item = (&str, f32)> {
        self.entities.iter().filter_map(|e| match e {
            ResolvedEntity::Actor {
                actor_id,
                confidence,
                ..
            } => Some((actor_id.as_str(), *confidence)),
            _ => None,
        })
    }

    /// Entities with recorded state, as (entity type, entity id)
    pub fn state_entities(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entities.iter().filter_map(|e| match e {
            ResolvedEntity::Entity {
                entity_type,
                entity_id,
            } => Some((entity_type.as_str(), entity_id.as_str())),
            _ => None,
        })
    }
}

/// Builds [`ParsedQuery`] values
#[derive(Debug, Clone)]
pub struct QueryProcessor {
    store: Arc<dyn WorkspaceStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    classifier: Arc<dyn Classifier>,
    clock: Arc<dyn Clock>,
    embedding_timeout: Duration,
    name_similarity_threshold: f32,
}

impl QueryProcessor {
    pub fn new(
        store: Arc<dyn WorkspaceStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        classifier: Arc<dyn Classifier>,
        clock: Arc<dyn Clock>,
        embedding_timeout: Duration,
        name_similarity_threshold: f32,
    ) -> Self {
        Self {
            store,
            embedder,
            classifier,
            clock,
            embedding_timeout,
            name_similarity_threshold,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Classify and enrich `query`; `forced_mode` overrides the classifier's choice
    pub async fn process(
        &self,
        workspace_id: &str,
        query: &str,
        forced_mode: Option<RouterMode>,
    ) -> Result<ParsedQuery> {
        let query = query.trim();
        if query.is_empty() {
            return Err(LodestarError::EmptySearchQuery);
        }

        let classification = self.classifier.classify(query);
        let mode = forced_mode.unwrap_or(classification.mode);
        let now = self.clock.now();
        let temporal = temporal::parse(query, now);

        let (type_hints, terms) = topic_terms(query, &classification);

        let mut entities = Vec::new();
        self.resolve_documents(workspace_id, &classification.identifiers, &mut entities)
            .await;
        self.resolve_actors(workspace_id, &classification.actor_mentions, &mut entities)
            .await;
        self.resolve_state_entities(workspace_id, query, &mut entities)
            .await;

        let identifier_query = mode == RouterMode::Knowledge && !classification.identifiers.is_empty();
        let (embedding, embedding_status) = if identifier_query || terms.is_empty() {
            (None, EmbeddingStatus::Skipped)
        } else {
            self.embed(&terms.join(" ")).await
        };

        debug!(
            %mode,
            classified = %classification.mode,
            confidence = classification.confidence,
            ambiguous = classification.ambiguous,
            entities = entities.len(),
            terms = ?terms,
            "Query processed"
        );

        Ok(ParsedQuery {
            workspace_id: workspace_id.to_string(),
            text: query.to_string(),
            mode,
            classification,
            temporal,
            type_hints,
            terms,
            entities,
            embedding,
            embedding_status,
            now,
        })
    }

    async fn embed(&self, text: &str) -> (Option<Vec<f32>>, EmbeddingStatus) {
        match tokio::time::timeout(self.embedding_timeout, self.embedder.embed(text)).await {
            Ok(Ok(vector)) => (Some(vector), EmbeddingStatus::Computed),
            Ok(Err(e)) => {
                warn!(provider = self.embedder.name(), error = %e, "Query embedding failed");
                (None, EmbeddingStatus::Unavailable(e.to_string()))
            }
            Err(_) => {
                let budget_ms = self.embedding_timeout.as_millis();
                warn!(provider = self.embedder.name(), budget_ms, "Query embedding timed out");
                (
                    None,
                    EmbeddingStatus::Unavailable(format!("timed out after {}ms", budget_ms)),
                )
            }
        }
    }

    async fn resolve_documents(
        &self,
        workspace_id: &str,
        identifiers: &[String],
        entities: &mut Vec<ResolvedEntity>,
    ) {
        for identifier in identifiers {
            let chunks = match self
                .store
                .find_chunks_by_identifier(workspace_id, identifier)
                .await
            {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!(identifier, error = %e, "Identifier lookup failed");
                    continue;
                }
            };
            // One entity per parent document
            let mut documents: BTreeMap<String, Vec<(u32, String)>> = BTreeMap::new();
            for chunk in chunks {
                documents
                    .entry(chunk.document_id)
                    .or_default()
                    .push((chunk.chunk_index, chunk.id));
            }
            for (document_id, mut chunks) in documents {
                if entities.iter().any(|e| {
                    matches!(e, ResolvedEntity::Document { document_id: d, .. } if *d == document_id)
                }) {
                    continue;
                }
                chunks.sort();
                entities.push(ResolvedEntity::Document {
                    document_id,
                    identifier: identifier.clone(),
                    chunk_ids: chunks.into_iter().map(|(_, id)| id).collect(),
                });
            }
        }
    }

    async fn resolve_actors(
        &self,
        workspace_id: &str,
        mentions: &[String],
        entities: &mut Vec<ResolvedEntity>,
    ) {
        if mentions.is_empty() {
            return;
        }
        let actors = match self.store.list_actors(workspace_id).await {
            Ok(actors) => actors,
            Err(e) => {
                warn!(error = %e, "Actor lookup failed");
                return;
            }
        };

        for mention in mentions {
            let mut best: Option<(String, String, f32)> = None;
            for actor in actors.iter().filter(|a| a.is_active()) {
                let mut candidates = vec![actor.display_name.clone()];
                if let Some(local) = actor.email.as_deref().and_then(|e| e.split('@').next()) {
                    candidates.push(local.to_string());
                }
                if let Ok(identities) = self
                    .store
                    .identities_for_actor(workspace_id, &actor.id)
                    .await
                {
                    for identity in identities {
                        candidates.push(identity.source_id);
                        candidates.extend(identity.display_name);
                    }
                }
                let score = candidates
                    .iter()
                    .map(|c| name_similarity(mention, c))
                    .fold(0.0f32, f32::max);
                if score >= self.name_similarity_threshold
                    && best.as_ref().is_none_or(|(_, _, s)| score > *s)
                {
                    best = Some((actor.id.clone(), actor.display_name.clone(), score));
                }
            }
            if let Some((actor_id, name, confidence)) = best
                && !entities.iter().any(
                    |e| matches!(e, ResolvedEntity::Actor { actor_id: a, .. } if *a == actor_id),
                )
            {
                entities.push(ResolvedEntity::Actor {
                    actor_id,
                    name,
                    confidence,
                });
            }
        }
    }

    async fn resolve_state_entities(
        &self,
        workspace_id: &str,
        query: &str,
        entities: &mut Vec<ResolvedEntity>,
    ) {
        let keys = match self.store.entity_keys(workspace_id).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Entity lookup failed");
                return;
            }
        };
        let query_words: HashSet<String> = words(&split_separators(query)).into_iter().collect();
        for (entity_type, entity_id) in keys {
            let id_words = words(&split_separators(&entity_id));
            if !id_words.is_empty() && id_words.iter().all(|w| query_words.contains(w)) {
                entities.push(ResolvedEntity::Entity {
                    entity_type,
                    entity_id,
                });
            }
        }
    }
}

fn split_separators(text: &str) -> String {
    text.replace(['-', '_', '.', '/'], " ")
}

/// Type hints and topic terms of a query
fn topic_terms(query: &str, classification: &Classification) -> (Vec<ObservationType>, Vec<String>) {
    let stripped = strip_actor_markers(&temporal::strip_temporal_markers(query));
    let mentions: HashSet<String> = classification
        .actor_mentions
        .iter()
        .map(|m| m.to_lowercase())
        .collect();

    let mut type_hints = Vec::new();
    let mut terms = Vec::new();
    for token in tokenize(&stripped) {
        if let Some(hint) = ObservationType::from_query_word(&token) {
            if !type_hints.contains(&hint) {
                type_hints.push(hint);
            }
        } else if !mentions.contains(&token) && !terms.contains(&token) {
            terms.push(token);
        }
    }
    (type_hints, terms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ActorIdentity, IdentityKey, MappingMethod, SourceType};
    use crate::query::{FixedClock, RuleClassifier, TemporalIntent};
    use crate::test_support::{self as ts, WS};

    async fn processor(snapshot: crate::storage::WorkspaceSnapshot) -> QueryProcessor {
        QueryProcessor::new(
            ts::load(snapshot).await,
            ts::embedder(),
            Arc::new(RuleClassifier::new()),
            Arc::new(FixedClock(ts::now())),
            Duration::from_secs(2),
            0.8,
        )
    }

    #[tokio::test]
    async fn test_identifier_resolves_document_and_skips_embedding() {
        let mut snapshot = ts::snapshot();
        snapshot.chunks.push(ts::github_chunk("c1", 482, "Move auth", "body"));
        let processor = processor(snapshot).await;

        let parsed = processor.process(WS, "#482", None).await.unwrap();
        assert_eq!(parsed.mode, RouterMode::Knowledge);
        assert!(parsed.has_identifier_hit());
        assert_eq!(
            parsed.documents().next(),
            Some(("doc-482", ["c1".to_string()].as_slice()))
        );
        assert!(parsed.embedding.is_none());
        assert_eq!(parsed.embedding_status, EmbeddingStatus::Skipped);
    }

    #[tokio::test]
    async fn test_temporal_query_strips_markers_and_extracts_type_hints() {
        let processor = processor(ts::snapshot()).await;

        let parsed = processor.process(WS, "yesterday incidents", None).await.unwrap();
        assert_eq!(parsed.mode, RouterMode::Temporal);
        assert_eq!(parsed.type_hints, vec![ObservationType::Incident]);
        assert!(parsed.terms.is_empty());
        assert_eq!(parsed.temporal.intent, Some(TemporalIntent::Window));
        // Nothing topical left to embed
        assert_eq!(parsed.embedding_status, EmbeddingStatus::Skipped);
    }

    #[tokio::test]
    async fn test_actor_query_terms_and_embedding() {
        let processor = processor(ts::snapshot()).await;

        let parsed = processor.process(WS, "who worked on auth", None).await.unwrap();
        assert_eq!(parsed.mode, RouterMode::Actor);
        assert_eq!(parsed.terms, vec!["auth"]);
        assert!(parsed.embedding.is_some());
    }

    #[tokio::test]
    async fn test_actor_mention_resolves_by_fuzzy_name() {
        let mut snapshot = ts::snapshot();
        snapshot.actors.push(ts::actor("a1", "Jane Doe"));
        snapshot.actors.push(ts::actor("a2", "Bob Smith"));
        snapshot.identities.push(ActorIdentity::new(
            IdentityKey::new(WS, SourceType::Github, "bsmith"),
            "a2",
            MappingMethod::ExplicitLink,
        ));
        let processor = processor(snapshot).await;

        let parsed = processor.process(WS, "reviews by jane.doe", None).await.unwrap();
        assert_eq!(parsed.actors().collect::<Vec<_>>(), vec![("a1", 1.0)]);

        let parsed = processor.process(WS, "what did @bsmith ship", None).await.unwrap();
        assert_eq!(parsed.actors().map(|(id, _)| id).collect::<Vec<_>>(), vec!["a2"]);

        let parsed = processor.process(WS, "changes by zed", None).await.unwrap();
        assert_eq!(parsed.actors().count(), 0);
    }

    #[tokio::test]
    async fn test_state_entities_resolve_from_query_words() {
        let mut snapshot = ts::snapshot();
        snapshot
            .states
            .push(ts::state("s1", "checkout-api", "degraded", ts::at(2, 0), None));
        let processor = processor(snapshot).await;

        let parsed = processor
            .process(WS, "current status of checkout api", None)
            .await
            .unwrap();
        assert_eq!(
            parsed.state_entities().collect::<Vec<_>>(),
            vec![("service", "checkout-api")]
        );
    }

    #[tokio::test]
    async fn test_empty_query_is_rejected_and_mode_can_be_forced() {
        let processor = processor(ts::snapshot()).await;
        assert!(matches!(
            processor.process(WS, "   ", None).await,
            Err(LodestarError::EmptySearchQuery)
        ));
        let parsed = processor
            .process(WS, "yesterday incidents", Some(RouterMode::Hybrid))
            .await
            .unwrap();
        assert_eq!(parsed.mode, RouterMode::Hybrid);
        assert_eq!(parsed.classification.mode, RouterMode::Temporal);
    }
}
