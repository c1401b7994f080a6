//! Request and response shapes of the engine's external interfaces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::diagnostics::Diagnostics;
use crate::models::{ActorType, ContentKind, NodeKind, RelationType, SourceMetadata, SourceType};
use crate::query::RouterMode;
use crate::search::Contributions;
use crate::storage::SearchFilters;

/// A search over one workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchRequest {
    pub workspace_id: String,
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
    /// Skip classification and use this mode
    #[serde(default)]
    pub mode: Option<RouterMode>,
    #[serde(default)]
    pub rerank: bool,
    /// Attach a rationale to every result
    #[serde(default)]
    pub explain: bool,
}

impl SearchRequest {
    pub fn new(workspace_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            query: query.into(),
            limit: None,
            filters: SearchFilters::default(),
            mode: None,
            rerank: false,
            explain: false,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_mode(mut self, mode: RouterMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    pub fn with_explain(mut self, explain: bool) -> Self {
        self.explain = explain;
        self
    }
}

/// Where a result lives in its source tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDescriptor {
    /// `None` for derived items (summaries, states without a source observation)
    #[serde(rename = "type")]
    pub source_type: Option<SourceType>,
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub actor_type: ActorType,
}

/// Actor signal behind a result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorExpertise {
    pub actor_id: String,
    pub topic: Option<String>,
    pub weight: f32,
}

/// Why a result ranked where it did
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rationale {
    /// Signals whose weighted contribution was material, strongest first
    pub signals: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph_path: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temporal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorExpertise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_view: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
    /// Full score breakdown; only on explicit request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributions: Option<Contributions>,
}

/// One ranked, hydrated result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub id: String,
    #[serde(rename = "type")]
    pub result_type: ContentKind,
    pub score: f32,
    pub title: String,
    pub snippet: String,
    pub highlights: Vec<String>,
    pub source: SourceDescriptor,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actor: Option<ActorDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<Rationale>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub diagnostics: Diagnostics,
}

/// Address of an item for batch fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ContentRef {
    /// Internal id of a chunk, observation, summary or state
    Id { id: String },
    /// Source-tool address, e.g. (`github`, `#482`)
    External {
        source_type: SourceType,
        external_id: String,
    },
}

impl ContentRef {
    pub fn id(id: impl Into<String>) -> Self {
        Self::Id { id: id.into() }
    }

    pub fn external(source_type: SourceType, external_id: impl Into<String>) -> Self {
        Self::External {
            source_type,
            external_id: external_id.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentsRequest {
    pub workspace_id: String,
    pub refs: Vec<ContentRef>,
    /// Attach one-hop graph neighbours to every item
    #[serde(default)]
    pub include_related: bool,
}

/// A graph neighbour of a fetched item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelatedItem {
    pub id: String,
    pub kind: NodeKind,
    pub relation: RelationType,
    pub confidence: f32,
    #[serde(default)]
    pub title: Option<String>,
}

/// Full content and metadata of one item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ContentKind,
    pub title: String,
    pub content: String,
    pub source: SourceDescriptor,
    #[serde(default)]
    pub metadata: Option<SourceMetadata>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub actor: Option<ActorDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related: Vec<RelatedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContentsResponse {
    pub items: Vec<ContentItem>,
    /// Refs that matched nothing, rendered as strings
    pub missing: Vec<String>,
}

/// A question to answer from the workspace
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRequest {
    pub workspace_id: String,
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub filters: SearchFilters,
}

impl AnswerRequest {
    pub fn new(workspace_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            query: query.into(),
            limit: None,
            filters: SearchFilters::default(),
        }
    }

    /// The search an answer is built on: always hybrid, always reranked
    pub fn to_search(&self) -> SearchRequest {
        SearchRequest {
            workspace_id: self.workspace_id.clone(),
            query: self.query.clone(),
            limit: self.limit,
            filters: self.filters.clone(),
            mode: Some(RouterMode::Hybrid),
            rerank: true,
            explain: false,
        }
    }
}

/// Source cited by an answer; `index` matches the `[n]` markers in the text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Citation {
    pub index: usize,
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub sources: Vec<SearchResult>,
    pub diagnostics: Diagnostics,
}

/// Incremental answer output
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnswerEvent {
    /// Ranked sources, sent before any text
    Sources { sources: Vec<SearchResult> },
    /// Next piece of answer text
    Delta { text: String },
    Done {
        citations: Vec<Citation>,
        diagnostics: Diagnostics,
    },
}
