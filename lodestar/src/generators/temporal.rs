//! Temporal generator: entity state by intent
//!
//! - current: point lookup of the current row per state type
//! - point in time: the row whose validity contains the reference instant
//! - history: every row, oldest first
//! - window: rows whose validity intersects the parsed window

use async_trait::async_trait;
use std::sync::Arc;

use super::{CandidateGenerator, Candidate, Evidence, GenerationInput, GeneratorKind};
use crate::Result;
use crate::models::TemporalState;
use crate::query::{ParsedQuery, TemporalIntent};
use crate::temporal::TemporalService;

#[derive(Debug, Clone)]
pub struct TemporalGenerator {
    service: Arc<TemporalService>,
}

impl TemporalGenerator {
    pub fn new(service: Arc<TemporalService>) -> Self {
        Self { service }
    }

    fn candidate(query: &ParsedQuery, state: &TemporalState) -> Candidate {
        let mut candidate = Candidate::state(state, GeneratorKind::Temporal);
        candidate.scores.temporal = Some(1.0);
        candidate.with_evidence(Evidence::Temporal {
            intent: query.temporal.intent,
            window: query.temporal.window,
            expression: query.temporal.expression.clone(),
            state: Some(state.describe()),
        })
    }
}

#[async_trait]
impl CandidateGenerator for TemporalGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Temporal
    }

    async fn generate(&self, input: GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        let workspace_id = query.workspace_id.as_str();
        let Some(intent) = query.temporal.intent else {
            return Ok(Vec::new());
        };
        let entities: Vec<&str> = query.state_entities().map(|(_, id)| id).collect();

        let mut states = Vec::new();
        match intent {
            TemporalIntent::Current => {
                for entity_id in &entities {
                    states.extend(self.service.current_states(workspace_id, entity_id).await?);
                }
            }
            TemporalIntent::PointInTime { at } => {
                for entity_id in &entities {
                    states.extend(self.service.at(workspace_id, entity_id, None, at).await?);
                }
            }
            TemporalIntent::History => {
                for entity_id in &entities {
                    let history = self.service.history(workspace_id, entity_id, None).await?;
                    states.extend(history.into_iter().filter(|s| {
                        query
                            .temporal
                            .window
                            .is_none_or(|w| w.overlaps(s.valid_from, s.valid_to))
                    }));
                }
            }
            // Observation-type hints without a state entity ask for events, not state
            TemporalIntent::Window if entities.is_empty() && !query.type_hints.is_empty() => {}
            TemporalIntent::Window => {
                if let Some(window) = query.temporal.window {
                    states.extend(
                        self.service
                            .in_window(workspace_id, window)
                            .await?
                            .into_iter()
                            .filter(|s| {
                                entities.is_empty() || entities.contains(&s.entity_id.as_str())
                            }),
                    );
                }
            }
        }

        Ok(states
            .iter()
            .filter(|s| input.filters.matches_state(s))
            .take(input.limit)
            .map(|s| Self::candidate(query, s))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{FixedClock, QueryProcessor, RuleClassifier};
    use crate::storage::{CacheService, SearchFilters};
    use crate::test_support::{self as ts, WS};
    use std::time::Duration;

    async fn run(text: &str) -> Vec<Candidate> {
        let mut snapshot = ts::snapshot();
        snapshot.states.extend([
            ts::state("s1", "checkout", "healthy", ts::at(1, 0), Some(ts::at(10, 4))),
            ts::state("s2", "checkout", "degraded", ts::at(10, 4), None),
            ts::state("s3", "billing", "healthy", ts::at(2, 0), None),
        ]);
        let store = ts::load(snapshot).await;
        let processor = QueryProcessor::new(
            Arc::clone(&store),
            ts::embedder(),
            Arc::new(RuleClassifier::new()),
            Arc::new(FixedClock(ts::now())),
            Duration::from_secs(2),
            0.8,
        );
        let service = Arc::new(TemporalService::new(store, Arc::new(CacheService::default())));
        let query = processor.process(WS, text, None).await.unwrap();
        let filters = SearchFilters::default();
        TemporalGenerator::new(service)
            .generate(GenerationInput {
                query: &query,
                filters: &filters,
                seeds: &[],
                limit: 50,
            })
            .await
            .unwrap()
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_current_intent() {
        let candidates = run("current status of checkout").await;
        assert_eq!(ids(&candidates), vec!["s2"]);
        assert_eq!(candidates[0].scores.temporal, Some(1.0));
    }

    #[tokio::test]
    async fn test_point_in_time_intent() {
        let candidates = run("checkout status as of 2026-03-05").await;
        assert_eq!(ids(&candidates), vec!["s1"]);
    }

    #[tokio::test]
    async fn test_history_intent_is_ordered() {
        let candidates = run("history of checkout").await;
        assert_eq!(ids(&candidates), vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_window_intent_without_entities() {
        let mut got = ids(&run("what changed yesterday").await)
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>();
        got.sort();
        // Every row valid at some point yesterday
        assert_eq!(got, vec!["s1", "s2", "s3"]);
    }

    #[tokio::test]
    async fn test_window_intent_with_type_hints_skips_states() {
        assert!(run("incidents yesterday").await.is_empty());

        let with_entity = run("checkout incidents yesterday").await;
        let mut got = ids(&with_entity);
        got.sort();
        assert_eq!(got, vec!["s1", "s2"]);
    }

    #[tokio::test]
    async fn test_no_intent_yields_nothing() {
        assert!(run("checkout design").await.is_empty());
    }
}
