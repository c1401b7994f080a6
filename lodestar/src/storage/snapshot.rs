//! Workspace snapshot loader
//!
//! A snapshot is one JSON document holding everything the upstream pipelines produced for a
//! workspace. It is validated as a whole before anything is written to the store.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::ml::{EmbeddingProvider, normalize};
use crate::models::{
    Actor, ActorIdentity, ActorProfile, Chunk, GraphEdge, Observation, ObservationView, Summary,
    TemporalState, verify_timeline,
};
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::models::{VectorNamespace, VectorRecord};
use crate::storage::traits::WorkspaceStore;

/// A precomputed vector shipped with the snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotVector {
    pub id: String,
    pub namespace: VectorNamespace,
    pub view: String,
    pub entity_id: String,
    pub vector: Vec<f32>,
}

/// Serialized contents of one workspace
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub workspace_id: String,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub summaries: Vec<Summary>,
    #[serde(default)]
    pub profiles: Vec<ActorProfile>,
    #[serde(default)]
    pub actors: Vec<Actor>,
    #[serde(default)]
    pub identities: Vec<ActorIdentity>,
    #[serde(default)]
    pub states: Vec<TemporalState>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default)]
    pub vectors: Vec<SnapshotVector>,
}

/// Counts of what a load wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    pub chunks: usize,
    pub observations: usize,
    pub summaries: usize,
    pub profiles: usize,
    pub actors: usize,
    pub identities: usize,
    pub states: usize,
    pub edges: usize,
    pub vectors_loaded: usize,
    pub vectors_embedded: usize,
}

/// Text waiting for an embedding
struct PendingVector {
    id: String,
    namespace: VectorNamespace,
    view: String,
    entity_id: String,
    text: String,
}

impl WorkspaceSnapshot {
    /// Read a snapshot from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::Io(format!("Failed to read snapshot {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> StorageResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check record invariants and workspace ownership
    pub fn validate(&self) -> StorageResult<()> {
        if self.workspace_id.is_empty() {
            return Err(StorageError::Validation(
                "Snapshot has no workspace_id".to_string(),
            ));
        }

        let owners = self
            .chunks
            .iter()
            .map(|c| (&c.workspace_id, &c.id))
            .chain(self.observations.iter().map(|o| (&o.workspace_id, &o.id)))
            .chain(self.summaries.iter().map(|s| (&s.workspace_id, &s.id)))
            .chain(self.profiles.iter().map(|p| (&p.workspace_id, &p.actor_id)))
            .chain(self.actors.iter().map(|a| (&a.workspace_id, &a.id)))
            .chain(self.identities.iter().map(|i| (&i.workspace_id, &i.source_id)))
            .chain(self.states.iter().map(|s| (&s.workspace_id, &s.id)))
            .chain(self.edges.iter().map(|e| (&e.workspace_id, &e.id)));
        for (workspace_id, id) in owners {
            if workspace_id != &self.workspace_id {
                return Err(StorageError::Validation(format!(
                    "Record {} belongs to workspace {}, not {}",
                    id, workspace_id, self.workspace_id
                )));
            }
        }

        for observation in &self.observations {
            observation.validate().map_err(StorageError::Validation)?;
        }

        verify_timeline(&self.states).map_err(|v| StorageError::Validation(v.to_string()))?;

        let mut keys = HashSet::new();
        let actor_ids: HashSet<&str> = self.actors.iter().map(|a| a.id.as_str()).collect();
        for identity in &self.identities {
            if (identity.confidence - identity.mapping_method.confidence()).abs() > f32::EPSILON {
                return Err(StorageError::Validation(format!(
                    "Identity ({}, {}) has confidence {} but method {} implies {}",
                    identity.source,
                    identity.source_id,
                    identity.confidence,
                    identity.mapping_method,
                    identity.mapping_method.confidence()
                )));
            }
            if !keys.insert(identity.key()) {
                return Err(StorageError::Validation(format!(
                    "Duplicate identity ({}, {})",
                    identity.source, identity.source_id
                )));
            }
            if !actor_ids.contains(identity.actor_id.as_str()) {
                return Err(StorageError::Validation(format!(
                    "Identity ({}, {}) points at unknown actor {}",
                    identity.source, identity.source_id, identity.actor_id
                )));
            }
        }

        Ok(())
    }

    /// Validate, then write everything into `store`, embedding any view without a vector
    pub async fn load_into(
        self,
        store: &dyn WorkspaceStore,
        embedder: &dyn EmbeddingProvider,
    ) -> crate::Result<SnapshotReport> {
        self.validate()?;

        let workspace_id = self.workspace_id.clone();
        let mut report = SnapshotReport::default();
        let provided: HashMap<String, SnapshotVector> = self
            .vectors
            .into_iter()
            .map(|v| (v.id.clone(), v))
            .collect();
        let mut pending: Vec<PendingVector> = Vec::new();

        let mut want = |id: String, namespace, view: &str, entity_id: &str, text: String| {
            if !provided.contains_key(&id) {
                pending.push(PendingVector {
                    id,
                    namespace,
                    view: view.to_string(),
                    entity_id: entity_id.to_string(),
                    text,
                });
            }
        };

        let mut chunks = self.chunks;
        for chunk in &mut chunks {
            let id = chunk
                .embedding_ref
                .get_or_insert_with(|| format!("chunk:{}", chunk.id))
                .clone();
            want(id, VectorNamespace::Chunks, "chunk", &chunk.id, chunk.indexed_text());
        }

        let mut observations = self.observations;
        for observation in &mut observations {
            for view in ObservationView::ALL {
                let slot = match view {
                    ObservationView::Title => &mut observation.embeddings.title,
                    ObservationView::Content => &mut observation.embeddings.content,
                    ObservationView::Summary => &mut observation.embeddings.summary,
                };
                let id = slot
                    .get_or_insert_with(|| format!("obs:{}:{}", observation.id, view.as_str()))
                    .clone();
                let text = observation.view_text(view).to_string();
                want(id, VectorNamespace::Observations, view.as_str(), &observation.id, text);
            }
        }

        let mut summaries = self.summaries;
        for summary in &mut summaries {
            let id = summary
                .embedding_ref
                .get_or_insert_with(|| format!("summary:{}", summary.id))
                .clone();
            let text = format!("{}\n{}", summary.topic, summary.content);
            want(id, VectorNamespace::Summaries, "summary", &summary.id, text);
        }

        let mut profiles = self.profiles;
        for profile in &mut profiles {
            let id = profile
                .centroid_ref
                .get_or_insert_with(|| format!("profile:{}", profile.actor_id))
                .clone();
            // Centroid text: the actor's observation titles plus expertise topics
            let mut text: Vec<String> = observations
                .iter()
                .filter(|o| o.actor_id.as_deref() == Some(profile.actor_id.as_str()))
                .map(|o| o.title.clone())
                .collect();
            text.extend(profile.expertise.keys().cloned());
            want(id, VectorNamespace::Profiles, "centroid", &profile.actor_id, text.join("\n"));
        }

        for actor in self.actors {
            store.put_actor(actor).await?;
            report.actors += 1;
        }
        for identity in self.identities {
            store.insert_identity(identity).await?;
            report.identities += 1;
        }
        for chunk in chunks {
            store.put_chunk(chunk).await?;
            report.chunks += 1;
        }
        for observation in observations {
            store.put_observation(observation).await?;
            report.observations += 1;
        }
        for summary in summaries {
            store.put_summary(summary).await?;
            report.summaries += 1;
        }
        for profile in profiles {
            store.put_profile(profile).await?;
            report.profiles += 1;
        }
        for state in self.states {
            store.put_state(state).await?;
            report.states += 1;
        }
        for edge in self.edges {
            store.put_edge(edge).await?;
            report.edges += 1;
        }

        for vector in provided.into_values() {
            store
                .upsert_vector(VectorRecord {
                    id: vector.id,
                    workspace_id: workspace_id.clone(),
                    namespace: vector.namespace,
                    view: vector.view,
                    entity_id: vector.entity_id,
                    vector: {
                        let mut v = vector.vector;
                        normalize(&mut v);
                        v
                    },
                })
                .await?;
            report.vectors_loaded += 1;
        }

        if !pending.is_empty() {
            let texts: Vec<String> = pending.iter().map(|p| p.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            for (item, vector) in pending.into_iter().zip(vectors) {
                store
                    .upsert_vector(VectorRecord {
                        id: item.id,
                        workspace_id: workspace_id.clone(),
                        namespace: item.namespace,
                        view: item.view,
                        entity_id: item.entity_id,
                        vector,
                    })
                    .await?;
                report.vectors_embedded += 1;
            }
        }

        tracing::debug!(
            workspace_id = %workspace_id,
            embedded = report.vectors_embedded,
            provider = embedder.name(),
            "Snapshot vectors written"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::HashingEmbedder;
    use crate::storage::InMemoryStore;
    use crate::storage::traits::{IdentityStore, KnowledgeStore, VectorIndex};
    use std::io::Write;

    const SNAPSHOT: &str = r##"{
        "workspace_id": "acme",
        "actors": [
            {"id": "alice", "workspace_id": "acme", "display_name": "Alice Liddell",
             "created_at": "2026-01-01T00:00:00Z"}
        ],
        "identities": [
            {"workspace_id": "acme", "source": "github", "source_id": "1001",
             "actor_id": "alice", "mapping_method": "explicit_link", "confidence": 1.0,
             "created_at": "2026-01-01T00:00:00Z"}
        ],
        "chunks": [
            {"id": "c1", "workspace_id": "acme", "document_id": "pr-482",
             "external_id": "#482", "title": "Move auth to the gateway",
             "content": "This PR moves token validation into the API gateway.",
             "source": {"source": "github", "repository": "acme/api", "number": 482},
             "document_timestamp": "2026-02-01T10:00:00Z"}
        ]
    }"##;

    #[tokio::test]
    async fn test_load_embeds_missing_vectors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SNAPSHOT.as_bytes()).unwrap();

        let snapshot = WorkspaceSnapshot::from_file(file.path()).unwrap();
        let store = InMemoryStore::new();
        let embedder = HashingEmbedder::new(32).unwrap();
        let report = snapshot.load_into(&store, &embedder).await.unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.identities, 1);
        assert_eq!(report.vectors_embedded, 1);

        let chunk = store.get_chunk("acme", "c1").await.unwrap().unwrap();
        let embedding_ref = chunk.embedding_ref.unwrap();
        assert!(store.get_vector("acme", &embedding_ref).await.unwrap().is_some());
        assert_eq!(store.list_actors("acme").await.unwrap().len(), 1);
    }

    #[test]
    fn test_validation_rejects_inconsistent_identity_confidence() {
        let mut snapshot = WorkspaceSnapshot::from_json(SNAPSHOT).unwrap();
        snapshot.identities[0].confidence = 0.85;
        assert!(matches!(
            snapshot.validate(),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_foreign_workspace_rows() {
        let mut snapshot = WorkspaceSnapshot::from_json(SNAPSHOT).unwrap();
        snapshot.chunks[0].workspace_id = "other".to_string();
        assert!(snapshot.validate().is_err());
    }
}
