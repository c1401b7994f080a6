//! Fixture builders shared by unit tests

use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;

use crate::ml::{EmbeddingProvider, HashingEmbedder};
use crate::models::{
    Actor, ActorType, Chunk, GraphEdge, NodeRef, Observation, ObservationEmbeddings,
    ObservationType, RelationType, SourceMetadata, TemporalState,
};
use crate::storage::snapshot::WorkspaceSnapshot;
use crate::storage::{InMemoryStore, WorkspaceStore};

pub const WS: &str = "ws";

/// Reference "now" used across tests: Wednesday 2026-03-11 15:30 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 15, 30, 0).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbedder::new(128).unwrap())
}

pub fn github_chunk(id: &str, number: u64, title: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        document_id: format!("doc-{}", number),
        chunk_index: 0,
        external_id: format!("#{}", number),
        title: title.to_string(),
        content: content.to_string(),
        source: SourceMetadata::Github {
            repository: "acme/api".to_string(),
            number: Some(number),
            path: None,
            labels: vec![],
        },
        url: Some(format!("https://github.com/acme/api/pull/{}", number)),
        author_id: None,
        document_timestamp: at(1, 9),
        embedding_ref: None,
    }
}

pub fn observation(
    id: &str,
    observation_type: ObservationType,
    title: &str,
    occurred_at: DateTime<Utc>,
) -> Observation {
    Observation {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        observation_type,
        occurred_at,
        captured_at: occurred_at,
        actor_id: None,
        source_actor: None,
        significance: 0.5,
        title: title.to_string(),
        content: title.to_string(),
        summary: String::new(),
        source: SourceMetadata::Slack {
            channel: "eng".to_string(),
            thread_ts: None,
        },
        references: vec![],
        topics: vec![],
        embeddings: ObservationEmbeddings::default(),
    }
}

pub fn actor(id: &str, name: &str) -> Actor {
    Actor {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        display_name: name.to_string(),
        email: None,
        actor_type: ActorType::Human,
        merged_into: None,
        created_at: at(1, 0),
    }
}

pub fn state(
    id: &str,
    entity_id: &str,
    value: &str,
    valid_from: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
) -> TemporalState {
    TemporalState {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        entity_type: "service".to_string(),
        entity_id: entity_id.to_string(),
        state_type: "status".to_string(),
        state_value: value.to_string(),
        valid_from,
        valid_to,
        is_current: valid_to.is_none(),
        created_at: valid_from,
        source_observation_id: None,
    }
}

pub fn edge(
    id: &str,
    source: NodeRef,
    target: NodeRef,
    relation: RelationType,
    confidence: f32,
) -> GraphEdge {
    GraphEdge {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        source,
        target,
        relation,
        confidence,
        hop_cost: 1.0,
        created_at: at(1, 0),
    }
}

/// Load a snapshot into a fresh in-memory store, embedding every view
pub async fn load(snapshot: WorkspaceSnapshot) -> Arc<dyn WorkspaceStore> {
    let store = Arc::new(InMemoryStore::new());
    snapshot
        .load_into(store.as_ref(), embedder().as_ref())
        .await
        .unwrap();
    store
}

pub fn snapshot() -> WorkspaceSnapshot {
    WorkspaceSnapshot {
        workspace_id: WS.to_string(),
        ..Default::default()
    }
}
