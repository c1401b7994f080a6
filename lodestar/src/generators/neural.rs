//! Neural generator: vector search over observation views, summaries and profile centroids
//!
//! An observation's neural score is the best cosine across its title, content and summary
//! views; the winning view is kept as evidence. When the query carries a time window the
//! window's observations are fetched first and the vector search is restricted to them.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use super::{CandidateGenerator, Candidate, Evidence, GenerationInput, GeneratorKind, clamp_unit};
use crate::Result;
use crate::config::ActorModeConfig;
use crate::models::Observation;
use crate::query::{ParsedQuery, RouterMode, TimeWindow};
use crate::storage::{VectorNamespace, VectorQuery, WorkspaceStore};

/// Number of profile centroids consulted for the actor signal
const PROFILE_MATCHES: usize = 5;

/// Best view score per observation id
type ViewScores = HashMap<String, (f32, String)>;

#[derive(Debug, Clone)]
pub struct NeuralGenerator {
    store: Arc<dyn WorkspaceStore>,
    actor: ActorModeConfig,
}

impl NeuralGenerator {
    pub fn new(store: Arc<dyn WorkspaceStore>, actor: ActorModeConfig) -> Self {
        Self { store, actor }
    }

    async fn view_scores(
        &self,
        query: &ParsedQuery,
        allowed: Option<&HashSet<String>>,
        limit: usize,
    ) -> Result<ViewScores> {
        let Some(embedding) = &query.embedding else {
            return Ok(ViewScores::new());
        };
        let matches = self
            .store
            .search_vectors(VectorQuery {
                workspace_id: &query.workspace_id,
                namespace: VectorNamespace::Observations,
                view: None,
                vector: embedding,
                limit,
                allowed_ids: allowed,
            })
            .await?;

        let mut best = ViewScores::new();
        for m in matches {
            let score = clamp_unit(m.score);
            match best.get(&m.entity_id) {
                Some((existing, _)) if *existing >= score => {}
                _ => {
                    best.insert(m.entity_id, (score, m.view));
                }
            }
        }
        Ok(best)
    }

    /// Actor id to centroid similarity, for profiles close to the query
    async fn profile_scores(&self, query: &ParsedQuery) -> Result<HashMap<String, f32>> {
        let Some(embedding) = &query.embedding else {
            return Ok(HashMap::new());
        };
        let matches = self
            .store
            .search_vectors(VectorQuery {
                workspace_id: &query.workspace_id,
                namespace: VectorNamespace::Profiles,
                view: None,
                vector: embedding,
                limit: PROFILE_MATCHES,
                allowed_ids: None,
            })
            .await?;
        Ok(matches
            .into_iter()
            .map(|m| (m.entity_id, clamp_unit(m.score)))
            .filter(|(_, score)| *score > 0.0)
            .collect())
    }

    fn build(
        observation: &Observation,
        view: Option<&(f32, String)>,
        profiles: &HashMap<String, f32>,
    ) -> Candidate {
        let mut candidate = Candidate::observation(observation, GeneratorKind::Neural);
        if let Some((score, view)) = view {
            candidate.scores.neural = Some(*score);
            candidate = candidate
                .with_vector_score(*score)
                .with_evidence(Evidence::View {
                    view: view.clone(),
                    score: *score,
                });
        }
        if let Some(actor_id) = observation.actor_id.as_deref()
            && let Some(weight) = profiles.get(actor_id)
        {
            candidate.scores.actor = Some(*weight);
            candidate = candidate.with_evidence(Evidence::Actor {
                actor_id: actor_id.to_string(),
                topic: None,
                weight: *weight,
            });
        }
        candidate
    }

    fn type_allowed(query: &ParsedQuery, observation: &Observation) -> bool {
        query.type_hints.is_empty() || query.type_hints.contains(&observation.observation_type)
    }

    async fn window_candidates(
        &self,
        input: &GenerationInput<'_>,
        window: TimeWindow,
        profiles: &HashMap<String, f32>,
    ) -> Result<Vec<Candidate>> {
        let query = input.query;
        let observations: Vec<Observation> = self
            .store
            .observations_in_window(&query.workspace_id, window.start, window.end, input.filters)
            .await?
            .into_iter()
            .filter(|o| Self::type_allowed(query, o))
            .collect();
        if observations.is_empty() {
            return Ok(Vec::new());
        }

        let allowed: HashSet<String> = observations.iter().map(|o| o.id.clone()).collect();
        let views = self
            .view_scores(query, Some(&allowed), allowed.len() * 3)
            .await?;

        let mut candidates: Vec<Candidate> = observations
            .iter()
            .map(|observation| {
                let mut candidate = Self::build(observation, views.get(&observation.id), profiles);
                candidate.scores.temporal = Some(1.0);
                candidate.with_evidence(Evidence::Temporal {
                    intent: query.temporal.intent,
                    window: Some(window),
                    expression: query.temporal.expression.clone(),
                    state: None,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.scores
                .neural
                .unwrap_or(0.0)
                .total_cmp(&a.scores.neural.unwrap_or(0.0))
                .then_with(|| b.occurred_at.cmp(&a.occurred_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(input.limit);
        Ok(candidates)
    }

    async fn vector_candidates(
        &self,
        input: &GenerationInput<'_>,
        profiles: &HashMap<String, f32>,
    ) -> Result<Vec<Candidate>> {
        let query = input.query;
        let views = self.view_scores(query, None, input.limit * 3).await?;

        let mut ranked: Vec<(&String, f32)> = views
            .iter()
            .filter(|(_, (score, _))| *score > 0.0)
            .map(|(id, (score, _))| (id, *score))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        let ids: Vec<String> = ranked
            .into_iter()
            .take(input.limit)
            .map(|(id, _)| id.clone())
            .collect();

        Ok(self
            .store
            .get_observations(&query.workspace_id, &ids)
            .await?
            .iter()
            .filter(|o| input.filters.matches_observation(o) && Self::type_allowed(query, o))
            .map(|o| Self::build(o, views.get(&o.id), profiles))
            .collect())
    }

    async fn summary_candidates(&self, input: &GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        // Summaries have no observation type; an explicit type hint excludes them
        let Some(embedding) = &query.embedding else {
            return Ok(Vec::new());
        };
        if !query.type_hints.is_empty() {
            return Ok(Vec::new());
        }

        let matches = self
            .store
            .search_vectors(VectorQuery {
                workspace_id: &query.workspace_id,
                namespace: VectorNamespace::Summaries,
                view: None,
                vector: embedding,
                limit: input.limit,
                allowed_ids: None,
            })
            .await?;
        let scores: HashMap<String, f32> = matches
            .into_iter()
            .map(|m| (m.entity_id, clamp_unit(m.score)))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        let mut ids: Vec<String> = scores.keys().cloned().collect();
        ids.sort();

        Ok(self
            .store
            .get_summaries(&query.workspace_id, &ids)
            .await?
            .iter()
            .filter(|s| input.filters.matches_summary(s))
            .filter(|s| {
                query
                    .temporal
                    .window
                    .is_none_or(|w| w.overlaps(s.period_start, Some(s.period_end)))
            })
            .filter_map(|s| {
                let score = *scores.get(&s.id)?;
                let mut candidate = Candidate::summary(s, GeneratorKind::Neural)
                    .with_vector_score(score)
                    .with_evidence(Evidence::View {
                        view: "summary".to_string(),
                        score,
                    });
                candidate.scores.neural = Some(score);
                Some(candidate)
            })
            .collect())
    }

    /// Top actors by resolved mention or topic expertise, each with their best observations
    async fn actor_candidates(&self, input: &GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        let workspace_id = query.workspace_id.as_str();

        let mut weights: BTreeMap<String, (f32, Option<String>)> = BTreeMap::new();
        for (actor_id, confidence) in query.actors() {
            weights.insert(actor_id.to_string(), (confidence, None));
        }
        if !query.terms.is_empty() {
            for profile in self.store.list_profiles(workspace_id).await? {
                if let Some((topic, weight)) = profile.expertise_for(&query.terms)
                    && weight > 0.0
                {
                    let entry = weights
                        .entry(profile.actor_id.clone())
                        .or_insert((0.0, None));
                    if weight > entry.0 {
                        *entry = (weight, Some(topic));
                    }
                }
            }
        }

        let mut ranked: Vec<(String, f32, Option<String>)> = weights
            .into_iter()
            .map(|(id, (weight, topic))| (id, weight, topic))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.actor.top_actors);

        let mut candidates = Vec::new();
        for (actor_id, weight, topic) in ranked {
            let observations: Vec<Observation> = self
                .store
                .observations_by_actor(workspace_id, &actor_id, input.limit.max(50))
                .await?
                .into_iter()
                .filter(|o| input.filters.matches_observation(o) && Self::type_allowed(query, o))
                .filter(|o| query.temporal.window.is_none_or(|w| w.contains(o.occurred_at)))
                .collect();
            if observations.is_empty() {
                continue;
            }

            let allowed: HashSet<String> = observations.iter().map(|o| o.id.clone()).collect();
            let views = self
                .view_scores(query, Some(&allowed), allowed.len() * 3)
                .await?;

            let mut scored: Vec<(bool, f32, &Observation)> = observations
                .iter()
                .map(|o| {
                    let relevance = views.get(&o.id).map_or(0.0, |(s, _)| *s);
                    (o.touches_topic(&query.terms), relevance, o)
                })
                .collect();
            scored.sort_by(|a, b| {
                b.0.cmp(&a.0)
                    .then_with(|| b.1.total_cmp(&a.1))
                    .then_with(|| b.2.occurred_at.cmp(&a.2.occurred_at))
                    .then_with(|| a.2.id.cmp(&b.2.id))
            });

            for (_, _, observation) in scored.into_iter().take(self.actor.observations_per_actor) {
                let mut candidate =
                    Self::build(observation, views.get(&observation.id), &HashMap::new());
                candidate.scores.actor = Some(clamp_unit(weight));
                candidates.push(candidate.with_evidence(Evidence::Actor {
                    actor_id: actor_id.clone(),
                    topic: topic.clone(),
                    weight,
                }));
            }
        }
        Ok(candidates)
    }
}

#[async_trait]
impl CandidateGenerator for NeuralGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Neural
    }

    async fn generate(&self, input: GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        if query.mode == RouterMode::Actor {
            let candidates = self.actor_candidates(&input).await?;
            if !candidates.is_empty() {
                return Ok(candidates);
            }
        }

        let profiles = self.profile_scores(query).await?;
        let mut candidates = match query.temporal.window {
            Some(window) => self.window_candidates(&input, window, &profiles).await?,
            None => self.vector_candidates(&input, &profiles).await?,
        };
        candidates.extend(self.summary_candidates(&input).await?);
        Ok(candidates)
    }
}
