//! Fusion scorer
//!
//! Merges candidates from every generator into one ranking:
//!
//! ```text
//! score = wk*knowledge + wn*neural + wt*temporal + wa*actor + wg*graph + wr*recency + wi*importance
//! ```
//!
//! The weight row is chosen by router mode and always sums to 1.0, so with every component in
//! [0, 1] the fused score is in [0, 1] as well. Missing components contribute 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::{FusionConfig, FusionWeights};
use crate::generators::{Candidate, clamp_unit};
use crate::query::RouterMode;

/// Weighted contribution of each component to a fused score
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Contributions {
    pub knowledge: f32,
    pub neural: f32,
    pub temporal: f32,
    pub actor: f32,
    pub graph: f32,
    pub recency: f32,
    pub importance: f32,
}

impl Contributions {
    pub fn total(&self) -> f32 {
        self.knowledge
            + self.neural
            + self.temporal
            + self.actor
            + self.graph
            + self.recency
            + self.importance
    }
}

/// A candidate with its fused score
#[derive(Debug, Clone, Serialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f32,
    /// Recency factor in [0, 1]
    pub recency: f32,
    pub contributions: Contributions,
}

impl ScoredCandidate {
    pub fn id(&self) -> &str {
        &self.candidate.id
    }
}

/// Score descending, then recency descending, then id ascending
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.recency.total_cmp(&a.recency))
        .then_with(|| a.candidate.id.cmp(&b.candidate.id))
}

#[derive(Debug, Clone)]
pub struct FusionScorer {
    config: FusionConfig,
}

impl FusionScorer {
    pub fn new(config: FusionConfig) -> Self {
        Self { config }
    }

    pub fn weights_for(&self, mode: RouterMode) -> FusionWeights {
        let table = &self.config.weights;
        match mode {
            RouterMode::Hybrid => table.hybrid,
            RouterMode::Knowledge => table.knowledge,
            RouterMode::Neural => table.neural,
            RouterMode::Temporal => table.temporal,
            RouterMode::Actor => table.actor,
        }
    }

    /// `exp(-age_hours / half_life_hours)`; undated items and future timestamps are clamped
    pub fn recency(&self, occurred_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
        let Some(occurred_at) = occurred_at else {
            return 0.0;
        };
        let age_hours = (now - occurred_at).num_seconds().max(0) as f64 / 3600.0;
        let half_life = self.config.recency_half_life_hours.max(f64::EPSILON);
        clamp_unit((-age_hours / half_life).exp() as f32)
    }

    /// Deduplicate by id
    ///
    /// The first occurrence keeps its record; later duplicates only raise component scores,
    /// the vector score and the exact flag, and add their evidence.
    pub fn merge(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match index.get(&candidate.id) {
                Some(&at) => {
                    let first = &mut merged[at];
                    first.scores.merge_max(&candidate.scores);
                    if let Some(vector) = candidate.vector_score {
                        first.vector_score =
                            Some(first.vector_score.map_or(vector, |v| v.max(vector)));
                    }
                    first.exact |= candidate.exact;
                    first.evidence.extend(candidate.evidence);
                }
                None => {
                    index.insert(candidate.id.clone(), merged.len());
                    merged.push(candidate);
                }
            }
        }
        merged
    }

    /// Score and rank a merged candidate set
    pub fn score(
        &self,
        mode: RouterMode,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        let weights = self.weights_for(mode);
        let mut scored: Vec<ScoredCandidate> = candidates
            .into_iter()
            .map(|candidate| {
                let recency = self.recency(candidate.occurred_at, now);
                let component = |value: Option<f32>| clamp_unit(value.unwrap_or(0.0));
                let contributions = Contributions {
                    knowledge: weights.knowledge * component(candidate.scores.knowledge),
                    neural: weights.neural * component(candidate.scores.neural),
                    temporal: weights.temporal * component(candidate.scores.temporal),
                    actor: weights.actor * component(candidate.scores.actor),
                    graph: weights.graph * component(candidate.scores.graph),
                    recency: weights.recency * recency,
                    importance: weights.importance * clamp_unit(candidate.importance),
                };
                let score = if candidate.exact {
                    1.0
                } else {
                    clamp_unit(contributions.total())
                };
                ScoredCandidate {
                    candidate,
                    score,
                    recency,
                    contributions,
                }
            })
            .collect();
        scored.sort_by(rank_order);
        scored
    }

    /// Merge then score
    pub fn fuse(
        &self,
        mode: RouterMode,
        candidates: Vec<Candidate>,
        now: DateTime<Utc>,
    ) -> Vec<ScoredCandidate> {
        self.score(mode, self.merge(candidates), now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::{Evidence, GeneratorKind};
    use crate::models::ObservationType;
    use crate::test_support as ts;
    use chrono::Duration;

    fn scorer() -> FusionScorer {
        FusionScorer::new(FusionConfig::default())
    }

    fn chunk(id: &str) -> Candidate {
        Candidate::chunk(&ts::github_chunk(id, 1, "t", "c"), GeneratorKind::Knowledge)
    }

    #[test]
    fn test_every_mode_row_sums_to_one() {
        let scorer = scorer();
        for mode in RouterMode::ALL {
            let sum = scorer.weights_for(mode).sum();
            assert!((sum - 1.0).abs() < 1e-5, "{mode} sums to {sum}");
        }
        let temporal = scorer.weights_for(RouterMode::Temporal);
        let hybrid = scorer.weights_for(RouterMode::Hybrid);
        assert!(temporal.temporal > hybrid.temporal);
        assert!(temporal.recency > hybrid.recency);
        assert!(scorer.weights_for(RouterMode::Actor).actor > hybrid.actor);
    }

    #[test]
    fn test_recency_decay() {
        let scorer = scorer();
        let now = ts::now();
        assert_eq!(scorer.recency(Some(now), now), 1.0);
        let week = scorer.recency(Some(now - Duration::hours(168)), now);
        assert!((week - (-1.0f32).exp()).abs() < 1e-5);
        assert_eq!(scorer.recency(None, now), 0.0);
        // Future timestamps count as now
        assert_eq!(scorer.recency(Some(now + Duration::hours(3)), now), 1.0);
    }

    #[test]
    fn test_merge_keeps_first_record_and_max_components() {
        let mut first = chunk("c1");
        first.scores.knowledge = Some(0.4);
        first = first.with_evidence(Evidence::Lexical {
            matched_terms: vec!["auth".to_string()],
        });
        let mut second = chunk("c1");
        second.generator = GeneratorKind::Graph;
        second.scores.knowledge = Some(0.2);
        second.scores.graph = Some(0.6);
        second.vector_score = Some(0.7);

        let merged = scorer().merge(vec![first, second, chunk("c2")]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].generator, GeneratorKind::Knowledge);
        assert_eq!(merged[0].scores.knowledge, Some(0.4));
        assert_eq!(merged[0].scores.graph, Some(0.6));
        assert_eq!(merged[0].vector_score, Some(0.7));
        assert_eq!(merged[0].evidence.len(), 1);
    }

    #[test]
    fn test_missing_components_contribute_zero() {
        let mut candidate = chunk("c1");
        candidate.occurred_at = None;
        candidate.importance = 0.0;
        candidate.scores.knowledge = Some(1.0);

        let scored = scorer().fuse(RouterMode::Hybrid, vec![candidate], ts::now());
        assert!((scored[0].score - 0.30).abs() < 1e-6);
        assert_eq!(scored[0].contributions.neural, 0.0);
    }

    #[test]
    fn test_exact_match_ranks_first() {
        let mut strong = chunk("c1");
        strong.scores.knowledge = Some(1.0);
        strong.scores.neural = Some(1.0);
        let mut exact = chunk("c2");
        exact.exact = true;

        let scored = scorer().fuse(RouterMode::Knowledge, vec![strong, exact], ts::now());
        assert_eq!(scored[0].id(), "c2");
        assert_eq!(scored[0].score, 1.0);
        assert!(scored.iter().all(|s| (0.0..=1.0).contains(&s.score)));
    }

    #[test]
    fn test_ties_break_by_recency_then_id() {
        let make = |id: &str, occurred_at| {
            let mut c = Candidate::observation(
                &ts::observation(id, ObservationType::Decision, "t", occurred_at),
                GeneratorKind::Neural,
            );
            c.scores.neural = Some(0.5);
            c
        };
        let now = ts::now();
        // Same score inputs; o-old is older so ranks below the two recent ones
        let candidates = vec![
            make("o-old", ts::at(1, 0)),
            make("o-b", ts::at(11, 0)),
            make("o-a", ts::at(11, 0)),
        ];
        let scorer = FusionScorer::new(FusionConfig {
            recency_half_life_hours: 168.0,
            ..FusionConfig::default()
        });
        let ids: Vec<String> = scorer
            .fuse(RouterMode::Neural, candidates, now)
            .iter()
            .map(|s| s.id().to_string())
            .collect();
        assert_eq!(ids, vec!["o-a", "o-b", "o-old"]);
    }
}
