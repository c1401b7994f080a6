//! In-memory workspace store
//!
//! All state sits behind one `RwLock`, so every write (including merge and split) is a single
//! serializable transaction and reads never observe half-applied writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::models::{
    Actor, ActorIdentity, ActorProfile, Chunk, GraphEdge, IdentityKey, NodeRef, Observation,
    SourceType, Summary, TemporalState,
};
use crate::query::text::tokenize;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::filters::SearchFilters;
use crate::storage::lexical::LexicalIndex;
use crate::storage::models::{VectorMatch, VectorQuery, VectorRecord, cosine_similarity};
use crate::storage::traits::{
    BaseStore, GraphStore, IdentityStore, KnowledgeStore, MergeOutcome, NeuralStore,
    SplitOutcome, TemporalStore, VectorIndex,
};

#[derive(Debug, Default)]
struct WorkspaceData {
    chunks: HashMap<String, Chunk>,
    lexical: LexicalIndex,
    observations: HashMap<String, Observation>,
    summaries: HashMap<String, Summary>,
    profiles: HashMap<String, ActorProfile>,
    states: HashMap<String, TemporalState>,
    edges: HashMap<String, GraphEdge>,
    adjacency: HashMap<NodeRef, Vec<String>>,
    actors: HashMap<String, Actor>,
    identities: HashMap<(SourceType, String), ActorIdentity>,
    vectors: HashMap<String, VectorRecord>,
    recompute_queue: BTreeSet<String>,
}

/// Workspace store holding everything in process memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    workspaces: RwLock<HashMap<String, WorkspaceData>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, WorkspaceData>>> {
        self.workspaces
            .read()
            .map_err(|e| StorageError::Internal(format!("Store lock poisoned: {}", e)))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, WorkspaceData>>> {
        self.workspaces
            .write()
            .map_err(|e| StorageError::Transaction(format!("Store lock poisoned: {}", e)))
    }

    /// Run `f` against a workspace; unknown workspaces read as empty
    fn with_workspace<T>(
        &self,
        workspace_id: &str,
        f: impl FnOnce(&WorkspaceData) -> T,
    ) -> StorageResult<T> {
        let guard = self.read()?;
        match guard.get(workspace_id) {
            Some(data) => Ok(f(data)),
            None => Ok(f(&WorkspaceData::default())),
        }
    }

    fn with_workspace_mut<T>(
        &self,
        workspace_id: &str,
        f: impl FnOnce(&mut WorkspaceData) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut guard = self.write()?;
        f(guard.entry(workspace_id.to_string()).or_default())
    }
}

fn require_workspace(workspace_id: &str, what: &str) -> StorageResult<()> {
    if workspace_id.is_empty() {
        return Err(StorageError::Validation(format!(
            "{} must belong to a workspace",
            what
        )));
    }
    Ok(())
}

fn collect_in_order<T: Clone>(map: &HashMap<String, T>, ids: &[String]) -> Vec<T> {
    ids.iter().filter_map(|id| map.get(id).cloned()).collect()
}

#[async_trait]
impl BaseStore for InMemoryStore {
    async fn health_check(&self) -> StorageResult<bool> {
        Ok(self.read().is_ok())
    }

    async fn get_metadata(&self) -> StorageResult<serde_json::Value> {
        let guard = self.read()?;
        let workspaces: serde_json::Map<String, serde_json::Value> = guard
            .iter()
            .map(|(id, data)| {
                (
                    id.clone(),
                    serde_json::json!({
                        "chunks": data.chunks.len(),
                        "observations": data.observations.len(),
                        "summaries": data.summaries.len(),
                        "profiles": data.profiles.len(),
                        "states": data.states.len(),
                        "edges": data.edges.len(),
                        "actors": data.actors.len(),
                        "identities": data.identities.len(),
                        "vectors": data.vectors.len(),
                    }),
                )
            })
            .collect();
        Ok(serde_json::json!({
            "backend": "memory",
            "workspaces": workspaces,
        }))
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryStore {
    async fn put_chunk(&self, chunk: Chunk) -> StorageResult<Chunk> {
        require_workspace(&chunk.workspace_id, "Chunk")?;
        let workspace_id = chunk.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.lexical.insert(&chunk.id, &tokenize(&chunk.indexed_text()));
            data.chunks.insert(chunk.id.clone(), chunk.clone());
            Ok(chunk)
        })
    }

    async fn get_chunk(&self, workspace_id: &str, id: &str) -> StorageResult<Option<Chunk>> {
        self.with_workspace(workspace_id, |data| data.chunks.get(id).cloned())
    }

    async fn get_chunks(&self, workspace_id: &str, ids: &[String]) -> StorageResult<Vec<Chunk>> {
        self.with_workspace(workspace_id, |data| collect_in_order(&data.chunks, ids))
    }

    async fn find_chunks_by_identifier(
        &self,
        workspace_id: &str,
        identifier: &str,
    ) -> StorageResult<Vec<Chunk>> {
        self.with_workspace(workspace_id, |data| {
            let mut chunks: Vec<Chunk> = data
                .chunks
                .values()
                .filter(|c| c.matches_identifier(identifier))
                .cloned()
                .collect();
            chunks.sort_by(|a, b| {
                a.document_id
                    .cmp(&b.document_id)
                    .then(a.chunk_index.cmp(&b.chunk_index))
            });
            chunks
        })
    }

    async fn find_chunks_by_external_id(
        &self,
        workspace_id: &str,
        source_type: SourceType,
        external_id: &str,
    ) -> StorageResult<Vec<Chunk>> {
        self.with_workspace(workspace_id, |data| {
            let mut chunks: Vec<Chunk> = data
                .chunks
                .values()
                .filter(|c| c.source_type() == source_type && c.matches_identifier(external_id))
                .cloned()
                .collect();
            chunks.sort_by_key(|c| c.chunk_index);
            chunks
        })
    }

    async fn lexical_search(
        &self,
        workspace_id: &str,
        terms: &[String],
        filters: &SearchFilters,
        limit: usize,
    ) -> StorageResult<Vec<(String, f32)>> {
        self.with_workspace(workspace_id, |data| {
            data.lexical
                .search(terms)
                .into_iter()
                .filter(|(id, _)| {
                    data.chunks
                        .get(id)
                        .is_some_and(|chunk| filters.matches_chunk(chunk))
                })
                .take(limit)
                .collect()
        })
    }
}

#[async_trait]
impl NeuralStore for InMemoryStore {
    async fn put_observation(&self, observation: Observation) -> StorageResult<Observation> {
        require_workspace(&observation.workspace_id, "Observation")?;
        observation.validate().map_err(StorageError::Validation)?;
        let workspace_id = observation.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.observations
                .insert(observation.id.clone(), observation.clone());
            Ok(observation)
        })
    }

    async fn get_observation(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> StorageResult<Option<Observation>> {
        self.with_workspace(workspace_id, |data| data.observations.get(id).cloned())
    }

    async fn get_observations(
        &self,
        workspace_id: &str,
        ids: &[String],
    ) -> StorageResult<Vec<Observation>> {
        self.with_workspace(workspace_id, |data| collect_in_order(&data.observations, ids))
    }

    async fn observations_in_window(
        &self,
        workspace_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        filters: &SearchFilters,
    ) -> StorageResult<Vec<Observation>> {
        self.with_workspace(workspace_id, |data| {
            let mut observations: Vec<Observation> = data
                .observations
                .values()
                .filter(|o| o.occurred_at >= start && o.occurred_at < end)
                .filter(|o| filters.matches_observation(o))
                .cloned()
                .collect();
            observations.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(a.id.cmp(&b.id)));
            observations
        })
    }

    async fn observations_by_actor(
        &self,
        workspace_id: &str,
        actor_id: &str,
        limit: usize,
    ) -> StorageResult<Vec<Observation>> {
        self.with_workspace(workspace_id, |data| {
            let mut observations: Vec<Observation> = data
                .observations
                .values()
                .filter(|o| o.actor_id.as_deref() == Some(actor_id))
                .cloned()
                .collect();
            observations.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(a.id.cmp(&b.id)));
            observations.truncate(limit);
            observations
        })
    }

    async fn list_observations(&self, workspace_id: &str) -> StorageResult<Vec<Observation>> {
        self.with_workspace(workspace_id, |data| {
            data.observations.values().cloned().collect()
        })
    }

    async fn find_observations_by_external_id(
        &self,
        workspace_id: &str,
        source_type: SourceType,
        external_id: &str,
    ) -> StorageResult<Vec<Observation>> {
        self.with_workspace(workspace_id, |data| {
            let mut observations: Vec<Observation> = data
                .observations
                .values()
                .filter(|o| {
                    let own = o.source.source_type() == source_type
                        && o.source
                            .identifiers()
                            .iter()
                            .any(|id| id.eq_ignore_ascii_case(external_id));
                    let referenced = o.references.iter().any(|r| {
                        r.source_type == source_type
                            && r.external_id.eq_ignore_ascii_case(external_id)
                    });
                    own || referenced
                })
                .cloned()
                .collect();
            observations.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at).then(a.id.cmp(&b.id)));
            observations
        })
    }

    async fn put_summary(&self, summary: Summary) -> StorageResult<Summary> {
        require_workspace(&summary.workspace_id, "Summary")?;
        let workspace_id = summary.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.summaries.insert(summary.id.clone(), summary.clone());
            Ok(summary)
        })
    }

    async fn get_summaries(
        &self,
        workspace_id: &str,
        ids: &[String],
    ) -> StorageResult<Vec<Summary>> {
        self.with_workspace(workspace_id, |data| collect_in_order(&data.summaries, ids))
    }

    async fn put_profile(&self, profile: ActorProfile) -> StorageResult<ActorProfile> {
        require_workspace(&profile.workspace_id, "Profile")?;
        let workspace_id = profile.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.profiles
                .insert(profile.actor_id.clone(), profile.clone());
            Ok(profile)
        })
    }

    async fn get_profile(
        &self,
        workspace_id: &str,
        actor_id: &str,
    ) -> StorageResult<Option<ActorProfile>> {
        self.with_workspace(workspace_id, |data| data.profiles.get(actor_id).cloned())
    }

    async fn list_profiles(&self, workspace_id: &str) -> StorageResult<Vec<ActorProfile>> {
        self.with_workspace(workspace_id, |data| {
            let mut profiles: Vec<ActorProfile> = data.profiles.values().cloned().collect();
            profiles.sort_by(|a, b| a.actor_id.cmp(&b.actor_id));
            profiles
        })
    }
}

#[async_trait]
impl TemporalStore for InMemoryStore {
    async fn put_state(&self, state: TemporalState) -> StorageResult<TemporalState> {
        require_workspace(&state.workspace_id, "Temporal state")?;
        let workspace_id = state.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.states.insert(state.id.clone(), state.clone());
            Ok(state)
        })
    }

    async fn get_state(
        &self,
        workspace_id: &str,
        id: &str,
    ) -> StorageResult<Option<TemporalState>> {
        self.with_workspace(workspace_id, |data| data.states.get(id).cloned())
    }

    async fn current_state(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: &str,
    ) -> StorageResult<Option<TemporalState>> {
        self.with_workspace(workspace_id, |data| {
            data.states
                .values()
                .find(|s| s.is_current && s.entity_id == entity_id && s.state_type == state_type)
                .cloned()
        })
    }

    async fn state_history(
        &self,
        workspace_id: &str,
        entity_id: &str,
        state_type: Option<&str>,
    ) -> StorageResult<Vec<TemporalState>> {
        self.with_workspace(workspace_id, |data| {
            let mut states: Vec<TemporalState> = data
                .states
                .values()
                .filter(|s| s.entity_id == entity_id)
                .filter(|s| state_type.is_none_or(|t| s.state_type == t))
                .cloned()
                .collect();
            states.sort_by(|a, b| {
                a.valid_from
                    .cmp(&b.valid_from)
                    .then(a.state_type.cmp(&b.state_type))
            });
            states
        })
    }

    async fn states_in_window(
        &self,
        workspace_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<TemporalState>> {
        self.with_workspace(workspace_id, |data| {
            let mut states: Vec<TemporalState> = data
                .states
                .values()
                .filter(|s| s.overlaps(start, end))
                .cloned()
                .collect();
            states.sort_by(|a, b| b.valid_from.cmp(&a.valid_from).then(a.id.cmp(&b.id)));
            states
        })
    }

    async fn entity_keys(&self, workspace_id: &str) -> StorageResult<Vec<(String, String)>> {
        self.with_workspace(workspace_id, |data| {
            let keys: BTreeSet<(String, String)> = data
                .states
                .values()
                .map(|s| (s.entity_type.clone(), s.entity_id.clone()))
                .collect();
            keys.into_iter().collect()
        })
    }

    async fn record_transition(
        &self,
        state: TemporalState,
    ) -> StorageResult<Option<TemporalState>> {
        require_workspace(&state.workspace_id, "Temporal state")?;
        let workspace_id = state.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            if data.states.contains_key(&state.id) {
                return Err(StorageError::AlreadyExists(format!(
                    "Temporal state {}",
                    state.id
                )));
            }

            let current_id = data
                .states
                .values()
                .find(|s| {
                    s.is_current
                        && s.entity_id == state.entity_id
                        && s.state_type == state.state_type
                })
                .map(|s| s.id.clone());

            let mut closed = None;
            if let Some(current_id) = current_id
                && let Some(current) = data.states.get_mut(&current_id)
            {
                if state.valid_from <= current.valid_from {
                    return Err(StorageError::Conflict(format!(
                        "Transition for {} {} starts at {} but the current state started at {}",
                        state.entity_id, state.state_type, state.valid_from, current.valid_from
                    )));
                }
                current.valid_to = Some(state.valid_from);
                current.is_current = false;
                closed = Some(current.clone());
            }

            let mut new_state = state;
            new_state.valid_to = None;
            new_state.is_current = true;
            data.states.insert(new_state.id.clone(), new_state);
            Ok(closed)
        })
    }
}

#[async_trait]
impl GraphStore for InMemoryStore {
    async fn put_edge(&self, edge: GraphEdge) -> StorageResult<GraphEdge> {
        require_workspace(&edge.workspace_id, "Edge")?;
        if !(0.0..=1.0).contains(&edge.confidence) {
            return Err(StorageError::Validation(format!(
                "Edge {} confidence {} outside [0, 1]",
                edge.id, edge.confidence
            )));
        }
        let workspace_id = edge.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            if let Some(previous) = data.edges.remove(&edge.id) {
                for node in [&previous.source, &previous.target] {
                    if let Some(ids) = data.adjacency.get_mut(node) {
                        ids.retain(|id| id != &previous.id);
                    }
                }
            }
            for node in [&edge.source, &edge.target] {
                data.adjacency
                    .entry(node.clone())
                    .or_default()
                    .push(edge.id.clone());
            }
            data.edges.insert(edge.id.clone(), edge.clone());
            Ok(edge)
        })
    }

    async fn edges_for(&self, workspace_id: &str, node: &NodeRef) -> StorageResult<Vec<GraphEdge>> {
        self.with_workspace(workspace_id, |data| {
            data.adjacency
                .get(node)
                .map(|ids| {
                    ids.iter()
                        .filter_map(|id| data.edges.get(id).cloned())
                        .collect()
                })
                .unwrap_or_default()
        })
    }
}

#[async_trait]
impl IdentityStore for InMemoryStore {
    async fn find_identity(&self, key: &IdentityKey) -> StorageResult<Option<ActorIdentity>> {
        self.with_workspace(&key.workspace_id, |data| {
            data.identities
                .get(&(key.source, key.source_id.clone()))
                .cloned()
        })
    }

    async fn find_identity_by_email(
        &self,
        workspace_id: &str,
        email: &str,
    ) -> StorageResult<Option<ActorIdentity>> {
        self.with_workspace(workspace_id, |data| {
            let mut matches: Vec<&ActorIdentity> = data
                .identities
                .values()
                .filter(|i| {
                    i.email
                        .as_deref()
                        .is_some_and(|e| e.eq_ignore_ascii_case(email))
                })
                .collect();
            // Oldest mapping wins so repeated lookups agree
            matches.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then(a.source_id.cmp(&b.source_id))
            });
            matches.first().map(|i| (*i).clone())
        })
    }

    async fn identities_for_actor(
        &self,
        workspace_id: &str,
        actor_id: &str,
    ) -> StorageResult<Vec<ActorIdentity>> {
        self.with_workspace(workspace_id, |data| {
            let mut identities: Vec<ActorIdentity> = data
                .identities
                .values()
                .filter(|i| i.actor_id == actor_id)
                .cloned()
                .collect();
            identities.sort_by(|a, b| a.key().cmp(&b.key()));
            identities
        })
    }

    async fn get_actor(&self, workspace_id: &str, id: &str) -> StorageResult<Option<Actor>> {
        self.with_workspace(workspace_id, |data| data.actors.get(id).cloned())
    }

    async fn list_actors(&self, workspace_id: &str) -> StorageResult<Vec<Actor>> {
        self.with_workspace(workspace_id, |data| {
            let mut actors: Vec<Actor> = data.actors.values().cloned().collect();
            actors.sort_by(|a, b| a.id.cmp(&b.id));
            actors
        })
    }

    async fn put_actor(&self, actor: Actor) -> StorageResult<Actor> {
        require_workspace(&actor.workspace_id, "Actor")?;
        let workspace_id = actor.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.actors.insert(actor.id.clone(), actor.clone());
            Ok(actor)
        })
    }

    async fn insert_identity(&self, identity: ActorIdentity) -> StorageResult<ActorIdentity> {
        require_workspace(&identity.workspace_id, "Identity")?;
        let workspace_id = identity.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            let key = (identity.source, identity.source_id.clone());
            if data.identities.contains_key(&key) {
                return Err(StorageError::AlreadyExists(format!(
                    "Identity ({}, {}) in workspace {}",
                    identity.source, identity.source_id, identity.workspace_id
                )));
            }
            if !data.actors.contains_key(&identity.actor_id) {
                return Err(StorageError::NotFound(format!(
                    "Actor {}",
                    identity.actor_id
                )));
            }
            data.identities.insert(key, identity.clone());
            Ok(identity)
        })
    }

    async fn create_actor_with_identity(
        &self,
        actor: Actor,
        identity: ActorIdentity,
    ) -> StorageResult<(Actor, ActorIdentity)> {
        require_workspace(&actor.workspace_id, "Actor")?;
        if actor.workspace_id != identity.workspace_id || identity.actor_id != actor.id {
            return Err(StorageError::Validation(
                "Identity must point at the actor being created in the same workspace".to_string(),
            ));
        }
        let workspace_id = actor.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            let key = (identity.source, identity.source_id.clone());
            if data.identities.contains_key(&key) {
                return Err(StorageError::AlreadyExists(format!(
                    "Identity ({}, {}) in workspace {}",
                    identity.source, identity.source_id, identity.workspace_id
                )));
            }
            if data.actors.contains_key(&actor.id) {
                return Err(StorageError::AlreadyExists(format!("Actor {}", actor.id)));
            }
            data.actors.insert(actor.id.clone(), actor.clone());
            data.identities.insert(key, identity.clone());
            Ok((actor, identity))
        })
    }

    async fn merge_actors(
        &self,
        workspace_id: &str,
        from: &str,
        into: &str,
    ) -> StorageResult<MergeOutcome> {
        if from == into {
            return Err(StorageError::Validation(
                "Cannot merge an actor into itself".to_string(),
            ));
        }
        self.with_workspace_mut(workspace_id, |data| {
            let source = data
                .actors
                .get(from)
                .ok_or_else(|| StorageError::NotFound(format!("Actor {}", from)))?;
            let target = data
                .actors
                .get(into)
                .ok_or_else(|| StorageError::NotFound(format!("Actor {}", into)))?;

            if let Some(other) = &target.merged_into {
                return Err(StorageError::Conflict(format!(
                    "Actor {} was already merged into {}",
                    into, other
                )));
            }
            let already_merged = match source.merged_into.as_deref() {
                None => false,
                Some(existing) if existing == into => true,
                Some(existing) => {
                    return Err(StorageError::Conflict(format!(
                        "Actor {} was already merged into {}",
                        from, existing
                    )));
                }
            };

            let mut outcome = MergeOutcome {
                already_merged,
                ..Default::default()
            };

            for identity in data.identities.values_mut() {
                if identity.actor_id == from {
                    identity.reassign(into);
                    outcome.identities_moved += 1;
                }
            }
            for observation in data.observations.values_mut() {
                if observation.actor_id.as_deref() == Some(from) {
                    observation.actor_id = Some(into.to_string());
                    outcome.observations_moved += 1;
                }
            }
            for chunk in data.chunks.values_mut() {
                if chunk.author_id.as_deref() == Some(from) {
                    chunk.author_id = Some(into.to_string());
                    outcome.chunks_moved += 1;
                }
            }

            let moved =
                outcome.identities_moved + outcome.observations_moved + outcome.chunks_moved;
            if already_merged && moved == 0 {
                return Ok(outcome);
            }

            if let Some(source) = data.actors.get_mut(from) {
                source.merged_into = Some(into.to_string());
            }
            data.profiles.remove(from);
            data.recompute_queue.remove(from);
            data.recompute_queue.insert(into.to_string());

            Ok(outcome)
        })
    }

    async fn split_actor(
        &self,
        workspace_id: &str,
        from: &str,
        identities: &[IdentityKey],
        new_actor: Actor,
    ) -> StorageResult<SplitOutcome> {
        if identities.is_empty() {
            return Err(StorageError::Validation(
                "Split needs at least one identity to move".to_string(),
            ));
        }
        if new_actor.workspace_id != workspace_id {
            return Err(StorageError::Validation(
                "New actor must belong to the same workspace".to_string(),
            ));
        }
        self.with_workspace_mut(workspace_id, |data| {
            let source = data
                .actors
                .get(from)
                .ok_or_else(|| StorageError::NotFound(format!("Actor {}", from)))?;
            if source.merged_into.is_some() {
                return Err(StorageError::Conflict(format!(
                    "Actor {} was merged and owns no identities",
                    from
                )));
            }
            if data.actors.contains_key(&new_actor.id) {
                return Err(StorageError::AlreadyExists(format!(
                    "Actor {}",
                    new_actor.id
                )));
            }

            let mut keys = HashSet::new();
            for key in identities {
                let map_key = (key.source, key.source_id.clone());
                match data.identities.get(&map_key) {
                    Some(identity) if identity.actor_id == from => {
                        keys.insert(map_key);
                    }
                    _ => {
                        return Err(StorageError::Validation(format!(
                            "Identity ({}, {}) does not belong to actor {}",
                            key.source, key.source_id, from
                        )));
                    }
                }
            }

            let mut outcome = SplitOutcome::default();
            let new_id = new_actor.id.clone();
            data.actors.insert(new_id.clone(), new_actor);

            for key in &keys {
                if let Some(identity) = data.identities.get_mut(key) {
                    identity.reassign(&new_id);
                    outcome.identities_moved += 1;
                }
            }
            for observation in data.observations.values_mut() {
                let produced_by_moved = observation
                    .source_actor
                    .as_ref()
                    .is_some_and(|sa| keys.contains(&(sa.source, sa.source_id.clone())));
                if observation.actor_id.as_deref() == Some(from) && produced_by_moved {
                    observation.actor_id = Some(new_id.clone());
                    outcome.observations_moved += 1;
                }
            }

            data.recompute_queue.insert(from.to_string());
            data.recompute_queue.insert(new_id);
            Ok(outcome)
        })
    }

    async fn take_profile_recomputes(&self, workspace_id: &str) -> StorageResult<Vec<String>> {
        self.with_workspace_mut(workspace_id, |data| {
            Ok(std::mem::take(&mut data.recompute_queue)
                .into_iter()
                .collect())
        })
    }
}

#[async_trait]
impl VectorIndex for InMemoryStore {
    async fn upsert_vector(&self, record: VectorRecord) -> StorageResult<()> {
        require_workspace(&record.workspace_id, "Vector")?;
        if record.vector.is_empty() {
            return Err(StorageError::Validation(format!(
                "Vector {} is empty",
                record.id
            )));
        }
        let workspace_id = record.workspace_id.clone();
        self.with_workspace_mut(&workspace_id, |data| {
            data.vectors.insert(record.id.clone(), record);
            Ok(())
        })
    }

    async fn get_vector(
        &self,
        workspace_id: &str,
        embedding_ref: &str,
    ) -> StorageResult<Option<Vec<f32>>> {
        self.with_workspace(workspace_id, |data| {
            data.vectors.get(embedding_ref).map(|r| r.vector.clone())
        })
    }

    async fn search_vectors(&self, query: VectorQuery<'_>) -> StorageResult<Vec<VectorMatch>> {
        self.with_workspace(query.workspace_id, |data| {
            let mut matches: Vec<VectorMatch> = data
                .vectors
                .values()
                .filter(|r| r.namespace == query.namespace)
                .filter(|r| query.view.is_none_or(|view| r.view == view))
                .filter(|r| {
                    query
                        .allowed_ids
                        .is_none_or(|allowed| allowed.contains(&r.entity_id))
                })
                .map(|r| VectorMatch {
                    entity_id: r.entity_id.clone(),
                    embedding_ref: r.id.clone(),
                    view: r.view.clone(),
                    score: cosine_similarity(query.vector, &r.vector),
                })
                .collect();
            matches.sort_by(|a, b| {
                b.score
                    .total_cmp(&a.score)
                    .then_with(|| a.embedding_ref.cmp(&b.embedding_ref))
            });
            matches.truncate(query.limit);
            matches
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ActorType, MappingMethod, ObservationEmbeddings, ObservationType, SourceActorRef,
        SourceMetadata,
    };
    use crate::storage::models::VectorNamespace;
    use chrono::Duration;

    fn actor(id: &str) -> Actor {
        Actor {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            display_name: id.to_string(),
            email: None,
            actor_type: ActorType::Human,
            merged_into: None,
            created_at: Utc::now(),
        }
    }

    fn identity(source_id: &str, actor_id: &str) -> ActorIdentity {
        ActorIdentity::new(
            IdentityKey::new("ws", SourceType::Github, source_id),
            actor_id,
            MappingMethod::Created,
        )
    }

    fn observation(id: &str, actor_id: &str, source_id: &str) -> Observation {
        let now = Utc::now();
        Observation {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            observation_type: ObservationType::Change,
            occurred_at: now,
            captured_at: now,
            actor_id: Some(actor_id.to_string()),
            source_actor: Some(SourceActorRef {
                source: SourceType::Github,
                source_id: source_id.to_string(),
            }),
            significance: 0.5,
            title: id.to_string(),
            content: String::new(),
            summary: String::new(),
            source: SourceMetadata::Github {
                repository: "acme/api".to_string(),
                number: None,
                path: None,
                labels: vec![],
            },
            references: vec![],
            topics: vec![],
            embeddings: ObservationEmbeddings::default(),
        }
    }

    #[tokio::test]
    async fn test_workspace_isolation() {
        let store = InMemoryStore::new();
        store.put_observation(observation("o1", "a", "x")).await.unwrap();

        assert!(store.get_observation("ws", "o1").await.unwrap().is_some());
        assert!(store.get_observation("other", "o1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identity_uniqueness_is_atomic() {
        let store = InMemoryStore::new();
        store
            .create_actor_with_identity(actor("a1"), identity("98765", "a1"))
            .await
            .unwrap();

        let result = store
            .create_actor_with_identity(actor("a2"), identity("98765", "a2"))
            .await;
        assert!(matches!(result, Err(StorageError::AlreadyExists(_))));
        // The losing attempt leaves no orphan actor behind
        assert!(store.get_actor("ws", "a2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_moves_rows_and_is_idempotent() {
        let store = InMemoryStore::new();
        store
            .create_actor_with_identity(actor("a"), identity("gh-a", "a"))
            .await
            .unwrap();
        store
            .create_actor_with_identity(actor("b"), identity("gh-b", "b"))
            .await
            .unwrap();
        store.put_observation(observation("o1", "a", "gh-a")).await.unwrap();

        let first = store.merge_actors("ws", "a", "b").await.unwrap();
        assert_eq!(first.identities_moved, 1);
        assert_eq!(first.observations_moved, 1);
        assert!(!first.already_merged);

        let moved = store
            .find_identity(&IdentityKey::new("ws", SourceType::Github, "gh-a"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(moved.actor_id, "b");
        assert_eq!(moved.mapping_method, MappingMethod::Admin);
        assert_eq!(
            store.take_profile_recomputes("ws").await.unwrap(),
            vec!["b".to_string()]
        );

        let actors = store.list_actors("ws").await.unwrap();
        let identities = store.identities_for_actor("ws", "b").await.unwrap();
        let observations = store.list_observations("ws").await.unwrap();
        let profiles = store.list_profiles("ws").await.unwrap();

        let second = store.merge_actors("ws", "a", "b").await.unwrap();
        assert_eq!(second.identities_moved, 0);
        assert!(second.already_merged);

        assert_eq!(store.list_actors("ws").await.unwrap(), actors);
        assert_eq!(store.identities_for_actor("ws", "b").await.unwrap(), identities);
        assert!(store.identities_for_actor("ws", "a").await.unwrap().is_empty());
        assert_eq!(store.list_observations("ws").await.unwrap(), observations);
        assert_eq!(store.list_profiles("ws").await.unwrap(), profiles);
        assert!(store.take_profile_recomputes("ws").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_split_moves_selected_identities() {
        let store = InMemoryStore::new();
        store
            .create_actor_with_identity(actor("a"), identity("gh-1", "a"))
            .await
            .unwrap();
        store.insert_identity(identity("gh-2", "a")).await.unwrap();
        store.put_observation(observation("o1", "a", "gh-1")).await.unwrap();
        store.put_observation(observation("o2", "a", "gh-2")).await.unwrap();

        let outcome = store
            .split_actor(
                "ws",
                "a",
                &[IdentityKey::new("ws", SourceType::Github, "gh-2")],
                actor("c"),
            )
            .await
            .unwrap();
        assert_eq!(outcome.identities_moved, 1);
        assert_eq!(outcome.observations_moved, 1);

        let o2 = store.get_observation("ws", "o2").await.unwrap().unwrap();
        assert_eq!(o2.actor_id.as_deref(), Some("c"));
        let o1 = store.get_observation("ws", "o1").await.unwrap().unwrap();
        assert_eq!(o1.actor_id.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_record_transition_closes_current_row() {
        let store = InMemoryStore::new();
        let start = Utc::now() - Duration::days(10);
        let state = |id: &str, value: &str, from| TemporalState {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            entity_type: "project".to_string(),
            entity_id: "atlas".to_string(),
            state_type: "status".to_string(),
            state_value: value.to_string(),
            valid_from: from,
            valid_to: None,
            is_current: true,
            created_at: from,
            source_observation_id: None,
        };

        store.record_transition(state("s1", "planned", start)).await.unwrap();
        let closed = store
            .record_transition(state("s2", "active", start + Duration::days(3)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(closed.id, "s1");
        assert_eq!(closed.valid_to, Some(start + Duration::days(3)));

        let history = store.state_history("ws", "atlas", Some("status")).await.unwrap();
        assert!(crate::models::verify_timeline(&history).is_ok());

        let stale = store
            .record_transition(state("s3", "done", start + Duration::days(1)))
            .await;
        assert!(matches!(stale, Err(StorageError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_vector_search_respects_allow_list() {
        let store = InMemoryStore::new();
        for (id, vector) in [("v1", vec![1.0, 0.0]), ("v2", vec![0.9, 0.1])] {
            store
                .upsert_vector(VectorRecord {
                    id: id.to_string(),
                    workspace_id: "ws".to_string(),
                    namespace: VectorNamespace::Observations,
                    view: "title".to_string(),
                    entity_id: format!("obs-{}", id),
                    vector,
                })
                .await
                .unwrap();
        }

        let allowed: HashSet<String> = ["obs-v2".to_string()].into_iter().collect();
        let matches = store
            .search_vectors(VectorQuery {
                workspace_id: "ws",
                namespace: VectorNamespace::Observations,
                view: Some("title"),
                vector: &[1.0, 0.0],
                limit: 10,
                allowed_ids: Some(&allowed),
            })
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].entity_id, "obs-v2");
    }
}
