//! Trait definitions for the workspace store
//!
//! Every read takes the workspace id and never returns rows belonging to another workspace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;

use crate::models::{
    Actor, ActorIdentity, ActorProfile, Chunk, GraphEdge, IdentityKey, NodeRef, Observation,
    SourceType, Summary, TemporalState,
};
use crate::storage::errors::StorageResult;
use crate::storage::filters::SearchFilters;
use crate::storage::models::{VectorMatch, VectorQuery, VectorRecord};

/// Base trait for all storage implementations
#[async_trait]
pub trait BaseStore: Send + Sync + 'static + Debug {
    /// Check if the store is healthy and available
    async fn health_check(&self) -> StorageResult<bool>;

    /// Get metadata about the store (backend, record counts)
    async fn get_metadata(&self) -> StorageResult<serde_json::Value>;
}

/// Knowledge chunks and their lexical index
#[async_trait]
pub trait KnowledgeStore: BaseStore {
    /// Insert or replace a chunk and (re)index its tokens
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<Chunk>;

    async fn get_chunk(&self, workspace_id: &str, id: &str) -> StorageResult<Option<Chunk>>;

    /// Chunks for the given ids, in request order, skipping unknown ids
    async fn get_chunks(&self, workspace_id: &str, ids: &[String]) -> StorageResult<Vec<Chunk>>;

    /// Chunks whose parent document is addressed by a literal identifier
    async fn find_chunks_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> StorageResult<Vec<Chunk>>;

    /// Chunks of the document with this (source type, external id)
    async fn find_chunks_by_external_id(
        &self,
        workspace_id: &str,
        source_type: SourceType,
        external_id: &str,
    ) -> StorageResult<Vec<Chunk>>;

    /// Raw BM25 scores for chunks passing `filters`, best first
    async fn lexical_search(
        &self,
        workspace_id: &str,
        terms: &[String],
        filters: &SearchFilters,
        limit: usize,
    ) -> StorageResult<Vec<(String, f32)>>;
}

/// Neural memory: observations, summaries and actor profiles
#[async_trait]
pub trait NeuralStore: BaseStore {
    async fn put_observation(&self, observation: Observation) -> StorageResult<Observation>;

    async fn get_observation(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> StorageResult<Option<Observation>>;

    /// Observations for the given ids, in request order, skipping unknown ids
    async fn get_observations(
        &self,
        workspace_id: &str,
        ids: &[String],
    ) -> StorageResult<Vec<Observation>>;

    /// Observations with `occurred_at` in `[start, end)` passing `filters`
    async fn observations_in_window(
        &self,
        workspace_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: &SearchFilters,
    ) -> StorageResult<Vec<Observation>>;

    /// An actor's observations, newest first
    async fn observations_by_actor(
        &self,
        workspace_id: &str,
        actor_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<Observation>>;

    /// Every observation in the workspace
    async fn list_observations(&self, workspace_id: &str) -> StorageResult<Vec<Observation>>;

    /// Observations produced by, or referencing, the item with this (source type, external id)
    async fn find_observations_by_external_id(
        &self,
        workspace_id: &str,
        source_type: SourceType,
        external_id: &str,
    ) -> StorageResult<Vec<Observation>>;

    async fn put_summary(&self, summary: Summary) -> StorageResult<Summary>;

    async fn get_summaries(
        &self,
        workspace_id: &str,
        ids: &[String],
    ) -> StorageResult<Vec<Summary>>;

    async fn put_profile(&self, profile: ActorProfile) -> StorageResult<ActorProfile>;

    async fn get_profile(
        &self,
        workspace_id: &str,
        actor_id: &str,
    ) -> StorageResult<Option<ActorProfile>>;

    async fn list_profiles(&self, workspace_id: &str) -> StorageResult<Vec<ActorProfile>>;
}

/// Append-only bi-temporal state history
#[async_trait]
pub trait TemporalStore: BaseStore {
    /// Raw insert; used when loading a snapshot
    async fn put_state(&self, state: TemporalState) -> StorageResult<TemporalState>;

    async fn get_state(&self, workspace_id: &str, id: &str)
    -> StorageResult<Option<TemporalState>>;

    /// The row with `is_current = true` for (entity, state type)
    async fn current_state(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: &str,
    ) -> StorageResult<Option<TemporalState>>;

    /// All rows of an entity ordered by `valid_from`, optionally narrowed to one state type
    async fn state_history(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: Option<&str>,
    ) -> StorageResult<Vec<TemporalState>>;

    /// Rows whose validity interval intersects `[start, end)`
    async fn states_in_window(
        &self,
        workspace_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<TemporalState>>;

    /// Distinct (entity type, entity id) pairs with recorded state
    async fn entity_keys(&self, workspace_id: &str) -> StorageResult<Vec<(String, String)>>;

    /// Close the current row for the new state's (entity, state type) at its `valid_from` and
    /// insert the new row as current, atomically. Returns the closed row.
    async fn record_transition(
        &self,
        state: TemporalState,
    ) -> StorageResult<Option<TemporalState>>;
}

/// Typed relationship edges
#[async_trait]
pub trait GraphStore: BaseStore {
    async fn put_edge(&self, edge: GraphEdge) -> StorageResult<GraphEdge>;

    /// Edges touching `node` in either direction
    async fn edges_for(&self, workspace_id: &str, node: &NodeRef) -> StorageResult<Vec<GraphEdge>>;
}

/// Result of an administrative merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub identities_moved: usize,
    pub observations_moved: usize,
    pub chunks_moved: usize,
    /// The source actor was already merged into the target before this call
    pub already_merged: bool,
}

/// Result of an administrative split
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutcome {
    pub identities_moved: usize,
    pub observations_moved: usize,
}

/// Actors and their source identities
#[async_trait]
pub trait IdentityStore: BaseStore {
    async fn find_identity(&self, key: &IdentityKey) -> StorageResult<Option<ActorIdentity>>;

    /// Any identity in the workspace carrying this email (case-insensitive)
    async fn find_identity_by_email(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> StorageResult<Option<ActorIdentity>>;

    async fn identities_for_actor(
        &self,
        workspace_id: &str,
        actor_id: &str,
    ) -> StorageResult<Vec<ActorIdentity>>;

    async fn get_actor(&self, workspace_id: &str, id: &str) -> StorageResult<Option<Actor>>;

    async fn list_actors(&self, workspace_id: &str) -> StorageResult<Vec<Actor>>;

    /// Insert or replace an actor
    async fn put_actor(&self, actor: Actor) -> StorageResult<Actor>;

    /// Insert a new identity; `AlreadyExists` if its key is taken
    async fn insert_identity(&self, identity: ActorIdentity) -> StorageResult<ActorIdentity>;

    /// Create an actor and its first identity atomically; on `AlreadyExists` nothing is written
    async fn create_actor_with_identity(
        &self,
        actor: Actor,
        identity: ActorIdentity,
    ) -> StorageResult<(Actor, ActorIdentity)>;

    /// Move identities, observation and chunk authorship from `from` to `into`, mark `from`
    /// merged and queue `into` for profile recompute, as one transaction
    async fn merge_actors(
        &self,
        workspace_id: &str,
        from: &str,
        into: &str,
    ) -> StorageResult<MergeOutcome>;

    /// Move the listed identities of `from`, and the observations they produced, to the new
    /// actor as one transaction; both actors are queued for profile recompute
    async fn split_actor(
        &self,
        workspace_id: &str,
        from: &str,
        identities: &[IdentityKey],
        new_actor: Actor,
    ) -> StorageResult<SplitOutcome>;

    /// Take and clear the queued profile recomputes
    async fn take_profile_recomputes(&self, workspace_id: &str) -> StorageResult<Vec<String>>;
}

/// Vector-similarity lookup keyed by workspace + namespace + view
#[async_trait]
pub trait VectorIndex: BaseStore {
    async fn upsert_vector(&self, record: VectorRecord) -> StorageResult<()>;

    async fn get_vector(
        &self,
        workspace_id: &str,
        embedding_ref: &str,
    ) -> StorageResult<Option<Vec<f32>>>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search_vectors(&self, query: VectorQuery<'_>) -> StorageResult<Vec<VectorMatch>>;
}

/// Everything the retrieval engine reads and the admin paths write
pub trait WorkspaceStore:
    KnowledgeStore + NeuralStore + TemporalStore + GraphStore + IdentityStore + VectorIndex
{
}

impl<T> WorkspaceStore for T where
    T: KnowledgeStore + NeuralStore + TemporalStore + GraphStore + IdentityStore + VectorIndex
{
}
