//! Data Transfer Objects for the API
//!
//! Requests are decoded into these shapes and converted into engine requests; responses are the
//! engine's own serializable types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use lodestar::core::{AnswerRequest, ContentRef, ContentsRequest, SearchRequest};
use lodestar::models::{IdentityKey, SourceType};
use lodestar::query::RouterMode;
use lodestar::storage::{MergeOutcome, SearchFilters, SplitOutcome};

/// Search one workspace
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchRequestDto {
    pub workspace_id: String,

    /// Natural-language query or source identifier (`#482`, `ENG-142`)
    pub query: String,

    /// Number of results; the server default applies when omitted
    #[serde(default)]
    pub limit: Option<usize>,

    /// Source, type, author, label and date filters
    #[serde(default)]
    #[schema(value_type = Object)]
    pub filters: SearchFilters,

    /// Skip classification and run in this mode
    #[serde(default)]
    #[schema(value_type = Option<String>, example = "hybrid")]
    pub mode: Option<RouterMode>,

    /// Rerank the top candidates
    #[serde(default)]
    pub rerank: bool,

    /// Attach a full score breakdown to every result
    #[serde(default)]
    pub explain: bool,
}

impl From<SearchRequestDto> for SearchRequest {
    fn from(dto: SearchRequestDto) -> Self {
        Self {
            workspace_id: dto.workspace_id,
            query: dto.query,
            limit: dto.limit,
            filters: dto.filters,
            mode: dto.mode,
            rerank: dto.rerank,
            explain: dto.explain,
        }
    }
}

/// Fetch full items by internal id or source address
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ContentsRequestDto {
    pub workspace_id: String,

    /// `{"id": "..."}` or `{"source_type": "github", "external_id": "#482"}`
    #[schema(value_type = Vec<Object>)]
    pub refs: Vec<ContentRef>,

    /// Attach one-hop graph neighbours
    #[serde(default)]
    pub include_related: bool,
}

impl From<ContentsRequestDto> for ContentsRequest {
    fn from(dto: ContentsRequestDto) -> Self {
        Self {
            workspace_id: dto.workspace_id,
            refs: dto.refs,
            include_related: dto.include_related,
        }
    }
}

/// Ask a question answered from the workspace with citations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnswerRequestDto {
    pub workspace_id: String,

    pub query: String,

    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    #[schema(value_type = Object)]
    pub filters: SearchFilters,
}

impl From<AnswerRequestDto> for AnswerRequest {
    fn from(dto: AnswerRequestDto) -> Self {
        Self {
            workspace_id: dto.workspace_id,
            query: dto.query,
            limit: dto.limit,
            filters: dto.filters,
        }
    }
}

/// Fold one actor into another
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MergeActorsRequest {
    pub workspace_id: String,

    /// Actor that disappears
    pub from: String,

    /// Actor that keeps the identities and observations
    pub into: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MergeActorsResponse {
    pub identities_moved: usize,
    pub observations_moved: usize,
    pub chunks_moved: usize,
    pub already_merged: bool,
    /// Actors whose profiles were rebuilt
    pub profiles_recomputed: Vec<String>,
}

impl MergeActorsResponse {
    pub fn new(outcome: MergeOutcome, profiles_recomputed: Vec<String>) -> Self {
        Self {
            identities_moved: outcome.identities_moved,
            observations_moved: outcome.observations_moved,
            chunks_moved: outcome.chunks_moved,
            already_merged: outcome.already_merged,
            profiles_recomputed,
        }
    }
}

/// A source identity, e.g. (`slack`, `U024BE7LH`)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IdentityDto {
    #[schema(value_type = String, example = "github")]
    pub source: SourceType,
    pub source_id: String,
}

/// Move some identities of an actor to a new actor
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SplitActorRequest {
    pub workspace_id: String,

    /// Actor to split
    pub from: String,

    /// Identities that move to the new actor
    pub identities: Vec<IdentityDto>,

    /// Display name of the new actor
    pub display_name: String,
}

impl SplitActorRequest {
    pub fn identity_keys(&self) -> Vec<IdentityKey> {
        self.identities
            .iter()
            .map(|i| IdentityKey::new(self.workspace_id.clone(), i.source, i.source_id.clone()))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SplitActorResponse {
    /// The newly created actor
    pub actor_id: String,
    pub display_name: String,
    pub identities_moved: usize,
    pub observations_moved: usize,
    pub profiles_recomputed: Vec<String>,
}

impl SplitActorResponse {
    pub fn new(
        actor_id: String,
        display_name: String,
        outcome: SplitOutcome,
        profiles_recomputed: Vec<String>,
    ) -> Self {
        Self {
            actor_id,
            display_name,
            identities_moved: outcome.identities_moved,
            observations_moved: outcome.observations_moved,
            profiles_recomputed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_search_request_defaults() {
        let dto: SearchRequestDto =
            serde_json::from_value(json!({"workspace_id": "acme", "query": "#482"})).unwrap();
        let request = SearchRequest::from(dto);
        assert_eq!(request, SearchRequest::new("acme", "#482"));
    }

    #[test]
    fn test_contents_refs_accept_both_shapes() {
        let dto: ContentsRequestDto = serde_json::from_value(json!({
            "workspace_id": "acme",
            "refs": [
                {"id": "c1"},
                {"source_type": "github", "external_id": "#482"}
            ]
        }))
        .unwrap();
        assert_eq!(
            dto.refs,
            vec![
                ContentRef::id("c1"),
                ContentRef::external(SourceType::Github, "#482")
            ]
        );
    }

    #[test]
    fn test_split_keys_are_scoped_to_workspace() {
        let request = SplitActorRequest {
            workspace_id: "acme".to_string(),
            from: "a1".to_string(),
            identities: vec![IdentityDto {
                source: SourceType::Slack,
                source_id: "U01".to_string(),
            }],
            display_name: "Jane (Slack)".to_string(),
        };
        assert_eq!(
            request.identity_keys(),
            vec![IdentityKey::new("acme", SourceType::Slack, "U01")]
        );
    }
}
