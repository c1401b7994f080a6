//! Candidate generators
//!
//! Each generator reads one kind of signal and returns scored [`Candidate`]s. Scores are
//! normalised into [0, 1] per component before they leave the generator; fusion only weighs
//! them. The [`runner`] executes the generators a router mode needs concurrently, each under
//! its own time budget.

pub mod graph;
pub mod knowledge;
pub mod neural;
pub mod runner;
pub mod temporal;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{self, Debug};

use crate::Result;
use crate::models::{Chunk, ContentKind, NodeKind, NodeRef, Observation, Summary, TemporalState};
use crate::query::{ParsedQuery, TemporalIntent, TimeWindow};
use crate::storage::SearchFilters;

pub use graph::{GraphGenerator, GraphService};
pub use knowledge::KnowledgeGenerator;
pub use neural::NeuralGenerator;
pub use runner::{GeneratorOutcome, GeneratorReport, GeneratorStatus};
pub use temporal::TemporalGenerator;

/// Importance prior of a knowledge chunk
pub const CHUNK_IMPORTANCE: f32 = 0.3;
/// Importance prior of a summary
pub const SUMMARY_IMPORTANCE: f32 = 0.6;
/// Importance prior of a temporal state row
pub const STATE_IMPORTANCE: f32 = 0.5;

/// Which generator produced a candidate
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    Knowledge,
    Neural,
    Temporal,
    Graph,
}

impl GeneratorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Neural => "neural",
            Self::Temporal => "temporal",
            Self::Graph => "graph",
        }
    }
}

impl fmt::Display for GeneratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-signal scores in [0, 1]; `None` means the signal did not see the candidate
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq)]
pub struct ComponentScores {
    pub knowledge: Option<f32>,
    pub neural: Option<f32>,
    pub temporal: Option<f32>,
    pub actor: Option<f32>,
    pub graph: Option<f32>,
}

fn max_opt(a: Option<f32>, b: Option<f32>) -> Option<f32> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

impl ComponentScores {
    /// Component-wise maximum
    pub fn merge_max(&mut self, other: &ComponentScores) {
        self.knowledge = max_opt(self.knowledge, other.knowledge);
        self.neural = max_opt(self.neural, other.neural);
        self.temporal = max_opt(self.temporal, other.temporal);
        self.actor = max_opt(self.actor, other.actor);
        self.graph = max_opt(self.graph, other.graph);
    }
}

/// Why a candidate was produced; feeds the result rationale
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Evidence {
    /// Exact identifier lookup
    Identifier { identifier: String },
    /// Query terms found in the text
    Lexical { matched_terms: Vec<String> },
    /// Best-matching embedded view
    View { view: String, score: f32 },
    /// Matched by time
    Temporal {
        intent: Option<TemporalIntent>,
        window: Option<TimeWindow>,
        expression: Option<String>,
        state: Option<String>,
    },
    /// Produced by, or attributed to, an actor
    Actor {
        actor_id: String,
        topic: Option<String>,
        weight: f32,
    },
    /// Reached by relationship expansion
    GraphPath {
        path: Vec<String>,
        hops: usize,
        confidence: f32,
    },
}

/// One scored item from one generator
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: String,
    pub kind: ContentKind,
    pub scores: ComponentScores,
    /// Best raw vector similarity seen for the item, clamped to [0, 1]
    pub vector_score: Option<f32>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub importance: f32,
    /// Resolved by exact identifier; ranks at the maximum score
    pub exact: bool,
    pub evidence: Vec<Evidence>,
    pub generator: GeneratorKind,
}

impl Candidate {
    fn new(
        id: &str,
        kind: ContentKind,
        occurred_at: Option<DateTime<Utc>>,
        importance: f32,
        generator: GeneratorKind,
    ) -> Self {
        Self {
            id: id.to_string(),
            kind,
            scores: ComponentScores::default(),
            vector_score: None,
            occurred_at,
            importance,
            exact: false,
            evidence: Vec::new(),
            generator,
        }
    }

    pub fn chunk(chunk: &Chunk, generator: GeneratorKind) -> Self {
        Self::new(
            &chunk.id,
            ContentKind::Chunk,
            Some(chunk.document_timestamp),
            CHUNK_IMPORTANCE,
            generator,
        )
    }

    pub fn observation(observation: &Observation, generator: GeneratorKind) -> Self {
        Self::new(
            &observation.id,
            ContentKind::Observation,
            Some(observation.occurred_at),
            observation.observation_type.importance(),
            generator,
        )
    }

    pub fn summary(summary: &Summary, generator: GeneratorKind) -> Self {
        Self::new(
            &summary.id,
            ContentKind::Summary,
            Some(summary.period_end),
            SUMMARY_IMPORTANCE,
            generator,
        )
    }

    pub fn state(state: &TemporalState, generator: GeneratorKind) -> Self {
        Self::new(
            &state.id,
            ContentKind::State,
            Some(state.valid_from),
            STATE_IMPORTANCE,
            generator,
        )
    }

    /// Graph node of the candidate
    pub fn node(&self) -> NodeRef {
        let kind = match self.kind {
            ContentKind::Chunk => NodeKind::Chunk,
            ContentKind::Observation => NodeKind::Observation,
            ContentKind::Summary => NodeKind::Summary,
            ContentKind::State => NodeKind::Entity,
        };
        NodeRef::new(kind, &self.id)
    }

    pub fn with_vector_score(mut self, score: f32) -> Self {
        let score = clamp_unit(score);
        self.vector_score = Some(self.vector_score.map_or(score, |s| s.max(score)));
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }
}

/// Clamp into [0, 1], mapping non-finite values to 0
pub fn clamp_unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// What a generator gets to work with
#[derive(Debug, Clone, Copy)]
pub struct GenerationInput<'a> {
    pub query: &'a ParsedQuery,
    pub filters: &'a SearchFilters,
    /// Nodes to expand from besides the query's resolved entities (graph only)
    pub seeds: &'a [NodeRef],
    /// Upper bound on candidates per generator
    pub limit: usize,
}

/// A source of scored candidates
#[async_trait]
pub trait CandidateGenerator: Send + Sync + Debug {
    fn kind(&self) -> GeneratorKind;

    async fn generate(&self, input: GenerationInput<'_>) -> Result<Vec<Candidate>>;
}
