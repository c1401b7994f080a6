//! Hydration: ranked ids back into full, provenance-bearing items

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

use super::types::{ActorDescriptor, ContentItem, Rationale, RelatedItem, SearchResult, SourceDescriptor};
use crate::Result;
use crate::models::{Chunk, ContentKind, Observation, SourceMetadata, Summary, TemporalState};
use crate::query::text::truncate_on_word;
use crate::storage::WorkspaceStore;

/// One fetched item in the uniform result shape
#[derive(Debug, Clone, PartialEq)]
pub struct Hydrated {
    pub id: String,
    pub kind: ContentKind,
    pub title: String,
    pub content: String,
    pub source: SourceDescriptor,
    pub metadata: Option<SourceMetadata>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub captured_at: Option<DateTime<Utc>>,
    pub actor_id: Option<String>,
    pub actor: Option<ActorDescriptor>,
}

impl Hydrated {
    fn from_chunk(chunk: Chunk) -> Self {
        Self {
            source: SourceDescriptor {
                source_type: Some(chunk.source_type()),
                id: chunk.external_id.clone(),
                url: chunk.url.clone(),
            },
            id: chunk.id,
            kind: ContentKind::Chunk,
            title: chunk.title,
            content: chunk.content,
            metadata: Some(chunk.source),
            occurred_at: Some(chunk.document_timestamp),
            captured_at: None,
            actor_id: chunk.author_id,
            actor: None,
        }
    }

    fn from_observation(observation: Observation) -> Self {
        let source_type = observation.source.source_type();
        let reference = observation
            .references
            .iter()
            .find(|r| r.source_type == source_type);
        let source = SourceDescriptor {
            source_type: Some(source_type),
            id: reference
                .map(|r| r.external_id.clone())
                .unwrap_or_else(|| observation.source.location()),
            url: reference.and_then(|r| r.url.clone()),
        };
        Self {
            id: observation.id,
            kind: ContentKind::Observation,
            title: observation.title,
            content: observation.content,
            source,
            metadata: Some(observation.source),
            occurred_at: Some(observation.occurred_at),
            captured_at: Some(observation.captured_at),
            actor_id: observation.actor_id,
            actor: None,
        }
    }

    fn from_summary(summary: Summary) -> Self {
        let content = if summary.key_points.is_empty() {
            summary.content.clone()
        } else {
            format!("{}\n- {}", summary.content, summary.key_points.join("\n- "))
        };
        Self {
            title: summary.title(),
            source: SourceDescriptor {
                source_type: None,
                id: summary.id.clone(),
                url: None,
            },
            id: summary.id,
            kind: ContentKind::Summary,
            content,
            metadata: None,
            occurred_at: Some(summary.period_end),
            captured_at: None,
            actor_id: None,
            actor: None,
        }
    }

    fn from_state(state: TemporalState, origin: Option<&Hydrated>) -> Self {
        let validity = match state.valid_to {
            Some(to) => format!("from {} until {}", state.valid_from.to_rfc3339(), to.to_rfc3339()),
            None => format!("since {}", state.valid_from.to_rfc3339()),
        };
        let source = origin.map(|o| o.source.clone()).unwrap_or(SourceDescriptor {
            source_type: None,
            id: state.id.clone(),
            url: None,
        });
        Self {
            title: state.describe(),
            content: format!("{} ({})", state.describe(), validity),
            source,
            metadata: origin.and_then(|o| o.metadata.clone()),
            occurred_at: Some(state.valid_from),
            captured_at: Some(state.created_at),
            actor_id: origin.and_then(|o| o.actor_id.clone()),
            actor: None,
            id: state.id,
            kind: ContentKind::State,
        }
    }

    /// Text handed to the reranker
    pub fn rerank_text(&self) -> String {
        format!("{}\n{}", self.title, self.content)
    }

    pub fn into_result(
        self,
        score: f32,
        snippet: String,
        highlights: Vec<String>,
        rationale: Option<Rationale>,
    ) -> SearchResult {
        SearchResult {
            id: self.id,
            result_type: self.kind,
            score,
            title: self.title,
            snippet,
            highlights,
            source: self.source,
            occurred_at: self.occurred_at,
            captured_at: self.captured_at,
            actor: self.actor,
            rationale,
        }
    }

    pub fn into_item(self, related: Vec<RelatedItem>) -> ContentItem {
        ContentItem {
            id: self.id,
            kind: self.kind,
            title: self.title,
            content: self.content,
            source: self.source,
            metadata: self.metadata,
            occurred_at: self.occurred_at,
            captured_at: self.captured_at,
            actor: self.actor,
            related,
        }
    }
}

/// Query terms that occur in the item's title or content
pub fn highlights(item: &Hydrated, terms: &[String]) -> Vec<String> {
    let haystack = format!("{} {}", item.title, item.content).to_lowercase();
    let mut seen = BTreeSet::new();
    terms
        .iter()
        .filter(|t| haystack.contains(t.as_str()) && seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Up to `max_chars` of `text`, centred near the first highlighted term when there is one
pub fn snippet(text: &str, highlights: &[String], max_chars: usize) -> String {
    let lowered = text.to_lowercase();
    let first_hit = highlights
        .iter()
        .filter_map(|term| lowered.find(term.as_str()))
        .min();

    let Some(byte_idx) = first_hit else {
        return truncate_on_word(text, max_chars);
    };
    let hit_char = lowered[..byte_idx].chars().count();
    let lead = max_chars / 4;
    if hit_char <= lead {
        return truncate_on_word(text, max_chars);
    }

    // Start at a word boundary shortly before the hit
    let start = hit_char - lead;
    let tail: String = text.chars().skip(start).collect();
    let tail = match tail.find(char::is_whitespace) {
        Some(ws) if ws < lead => tail[ws..].trim_start().to_string(),
        _ => tail,
    };
    format!("...{}", truncate_on_word(&tail, max_chars.saturating_sub(3)))
}

#[derive(Debug, Clone)]
pub struct Hydrator {
    store: Arc<dyn WorkspaceStore>,
}

impl Hydrator {
    pub fn new(store: Arc<dyn WorkspaceStore>) -> Self {
        Self { store }
    }

    /// Fetch every (id, kind) that still exists, keyed by id
    pub async fn hydrate(
        &self,
        workspace_id: &str,
        refs: &[(String, ContentKind)],
    ) -> Result<HashMap<String, Hydrated>> {
        let ids_of = |kind: ContentKind| -> Vec<String> {
            refs.iter()
                .filter(|(_, k)| *k == kind)
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut items: HashMap<String, Hydrated> = HashMap::with_capacity(refs.len());
        for chunk in self
            .store
            .get_chunks(workspace_id, &ids_of(ContentKind::Chunk))
            .await?
        {
            items.insert(chunk.id.clone(), Hydrated::from_chunk(chunk));
        }
        for observation in self
            .store
            .get_observations(workspace_id, &ids_of(ContentKind::Observation))
            .await?
        {
            items.insert(observation.id.clone(), Hydrated::from_observation(observation));
        }
        for summary in self
            .store
            .get_summaries(workspace_id, &ids_of(ContentKind::Summary))
            .await?
        {
            items.insert(summary.id.clone(), Hydrated::from_summary(summary));
        }
        for id in ids_of(ContentKind::State) {
            let Some(state) = self.store.get_state(workspace_id, &id).await? else {
                continue;
            };
            let origin = match &state.source_observation_id {
                Some(obs_id) => self
                    .store
                    .get_observation(workspace_id, obs_id)
                    .await?
                    .map(Hydrated::from_observation),
                None => None,
            };
            items.insert(id, Hydrated::from_state(state, origin.as_ref()));
        }

        self.attach_actors(workspace_id, &mut items).await?;
        debug!(requested = refs.len(), hydrated = items.len(), "Hydrated items");
        Ok(items)
    }

    async fn attach_actors(
        &self,
        workspace_id: &str,
        items: &mut HashMap<String, Hydrated>,
    ) -> Result<()> {
        let actor_ids: BTreeSet<String> = items.values().filter_map(|i| i.actor_id.clone()).collect();
        let mut actors = HashMap::with_capacity(actor_ids.len());
        for actor_id in actor_ids {
            if let Some(actor) = self.store.get_actor(workspace_id, &actor_id).await? {
                actors.insert(
                    actor_id,
                    ActorDescriptor {
                        id: actor.id,
                        name: actor.display_name,
                        actor_type: actor.actor_type,
                    },
                );
            }
        }
        for item in items.values_mut() {
            item.actor = item.actor_id.as_ref().and_then(|id| actors.get(id).cloned());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationType, SourceReference, SourceType};
    use crate::test_support::{self as ts, WS};

    async fn store() -> Arc<dyn WorkspaceStore> {
        let mut snapshot = ts::snapshot();
        snapshot.actors.push(ts::actor("a1", "Jane Doe"));
        let mut chunk = ts::github_chunk("c1", 482, "Move auth to gateway", "The gateway now owns auth.");
        chunk.author_id = Some("a1".to_string());
        snapshot.chunks.push(chunk);

        let mut obs = ts::observation("o1", ObservationType::Incident, "Checkout outage", ts::at(10, 9));
        obs.actor_id = Some("a1".to_string());
        obs.references.push(SourceReference {
            source_type: SourceType::Slack,
            external_id: "C1/1700".to_string(),
            url: Some("https://slack.example/C1/1700".to_string()),
        });
        snapshot.observations.push(obs);

        let mut state = ts::state("s1", "checkout", "degraded", ts::at(10, 9), None);
        state.source_observation_id = Some("o1".to_string());
        snapshot.states.push(state);
        snapshot.states.push(ts::state("s2", "billing", "healthy", ts::at(2, 0), None));
        ts::load(snapshot).await
    }

    #[tokio::test]
    async fn test_hydrates_each_kind_with_provenance() {
        let hydrator = Hydrator::new(store().await);
        let refs = vec![
            ("c1".to_string(), ContentKind::Chunk),
            ("o1".to_string(), ContentKind::Observation),
            ("s1".to_string(), ContentKind::State),
            ("s2".to_string(), ContentKind::State),
            ("gone".to_string(), ContentKind::Chunk),
        ];
        let items = hydrator.hydrate(WS, &refs).await.unwrap();
        assert_eq!(items.len(), 4);

        let chunk = &items["c1"];
        assert_eq!(chunk.source.source_type, Some(SourceType::Github));
        assert_eq!(chunk.source.id, "#482");
        assert_eq!(chunk.actor.as_ref().map(|a| a.name.as_str()), Some("Jane Doe"));

        let obs = &items["o1"];
        assert_eq!(obs.source.id, "C1/1700");
        assert!(obs.source.url.is_some());

        // A state inherits provenance from the observation that recorded it
        assert_eq!(items["s1"].source, obs.source);
        assert_eq!(items["s1"].actor, obs.actor);
        assert_eq!(items["s2"].source.source_type, None);
        assert_eq!(items["s2"].source.id, "s2");
    }

    #[test]
    fn test_snippet_windows_around_first_hit() {
        let text = "Lorem ipsum dolor sit amet consectetur adipiscing elit sed do eiusmod \
                    tempor incididunt ut labore et dolore magna aliqua the gateway owns auth now";
        let snippet = snippet(text, &["gateway".to_string()], 40);
        assert!(snippet.starts_with("..."));
        assert!(snippet.contains("gateway"));

        assert_eq!(super::snippet("short text", &[], 40), "short text");
    }

    #[tokio::test]
    async fn test_highlights_only_present_terms() {
        let hydrator = Hydrator::new(store().await);
        let items = hydrator
            .hydrate(WS, &[("c1".to_string(), ContentKind::Chunk)])
            .await
            .unwrap();
        let terms = vec!["auth".to_string(), "billing".to_string(), "auth".to_string()];
        assert_eq!(highlights(&items["c1"], &terms), vec!["auth".to_string()]);
    }
}
