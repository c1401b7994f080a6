//! Fixture builders shared by the integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use lodestar::config::{ConfigBuilder, LodestarConfig};
use lodestar::core::{RetrievalEngine, RetrievalEngineBuilder};
use lodestar::ml::{EmbeddingProvider, HashingEmbedder};
use lodestar::models::{
    Actor, ActorProfile, ActorType, Chunk, Observation, ObservationEmbeddings, ObservationType,
    SourceMetadata, TemporalState,
};
use lodestar::query::FixedClock;
use lodestar::storage::{InMemoryStore, WorkspaceSnapshot, WorkspaceStore};

pub const WS: &str = "acme";

/// Wednesday 2026-03-11 15:30 UTC
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 11, 15, 30, 0).unwrap()
}

pub fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap()
}

pub fn embedder() -> Arc<dyn EmbeddingProvider> {
    Arc::new(HashingEmbedder::new(128).unwrap())
}

pub fn config() -> LodestarConfig {
    ConfigBuilder::testing().build().unwrap()
}

pub fn snapshot() -> WorkspaceSnapshot {
    WorkspaceSnapshot {
        workspace_id: WS.to_string(),
        ..Default::default()
    }
}

pub fn chunk(id: &str, number: u64, title: &str, content: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        workspace_id: WS.to_string(),
        document_id: format!("pr-{}", number),
        chunk_index: 0,
        external_id: format!("#{}", number),
        title: title.to_string(),
        content: content.to_string(),
        source: SourceMetadata::Github {
            repository: "acme/platform".to_string(),
            number: Some(number),
            path: None,
            labels: vec![],
        },
        url: Some(format!("https://github.com/acme/platform/pull/{}", number)),
        author_id: None,
        document_timestamp: at(2, 10),
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
            channel: "incidents".to_string(),
            thread_ts: None,
        },
        references: vec![],
        topics: vec![],
        embeddings: ObservationEmbeddings::default(),
    }
}

/// Service status row; open-ended when `valid_to` is `None`
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

pub fn profile(actor_id: &str, expertise: &[(&str, f32)]) -> ActorProfile {
    let mut profile = ActorProfile::new(WS, actor_id);
    profile.expertise = expertise
        .iter()
        .map(|(topic, weight)| (topic.to_string(), *weight))
        .collect::<BTreeMap<_, _>>();
    profile.confidence = 0.8;
    profile
}

pub async fn load(snapshot: WorkspaceSnapshot) -> Arc<dyn WorkspaceStore> {
    let store = Arc::new(InMemoryStore::new());
    snapshot
        .load_into(store.as_ref(), embedder().as_ref())
        .await
        .unwrap();
    store
}

/// Engine over `snapshot` with a fixed clock; `customize` can swap collaborators
pub async fn engine_with(
    snapshot: WorkspaceSnapshot,
    config: LodestarConfig,
    customize: impl FnOnce(RetrievalEngineBuilder) -> RetrievalEngineBuilder,
) -> RetrievalEngine {
    let builder = RetrievalEngine::builder(config)
        .with_store(load(snapshot).await)
        .with_embedder(embedder())
        .with_clock(Arc::new(FixedClock(now())));
    customize(builder).build().unwrap()
}

pub async fn engine(snapshot: WorkspaceSnapshot) -> RetrievalEngine {
    engine_with(snapshot, config(), |b| b).await
}
