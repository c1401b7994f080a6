//! Search filters
//!
//! Fields compose with AND; values inside one multi-valued field compose with OR. An absent or
//! empty field does not constrain anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{
    Chunk, ContentKind, Observation, ObservationType, SourceType, Summary, TemporalState,
};

/// Date bounds; `start` inclusive, `end` exclusive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct DateRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|start| at >= start) && self.end.is_none_or(|end| at < end)
    }

    /// Whether `[from, to)` intersects the range
    pub fn overlaps(&self, from: DateTime<Utc>, to: Option<DateTime<Utc>>) -> bool {
        let starts_before_end = self.end.is_none_or(|end| from < end);
        let ends_after_start = match (self.start, to) {
            (Some(start), Some(to)) => to > start,
            _ => true,
        };
        starts_before_end && ends_after_start
    }

    /// Narrow this range to its intersection with `[start, end)`
    pub fn intersect(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> DateRange {
        DateRange {
            start: Some(self.start.map_or(start, |s| s.max(start))),
            end: Some(self.end.map_or(end, |e| e.min(end))),
        }
    }
}

/// Caller-supplied search filters
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SearchFilters {
    /// Source tools
    #[serde(default)]
    pub sources: Option<Vec<SourceType>>,

    /// Result kinds (`chunk`, `observation`, `summary`, `state`) or observation types
    /// (`incident`, `decision`, ...)
    #[serde(default)]
    pub types: Option<Vec<String>>,

    /// Canonical actor ids
    #[serde(default)]
    pub authors: Option<Vec<String>>,

    /// Source labels
    #[serde(default)]
    pub labels: Option<Vec<String>>,

    /// Applies to `occurred_at` for neural memory and the document timestamp for knowledge
    #[serde(default)]
    pub date_range: Option<DateRange>,
}

fn active<T>(field: &Option<Vec<T>>) -> Option<&[T]> {
    field.as_deref().filter(|values| !values.is_empty())
}

impl SearchFilters {
    pub fn is_empty(&self) -> bool {
        active(&self.sources).is_none()
            && active(&self.types).is_none()
            && active(&self.authors).is_none()
            && active(&self.labels).is_none()
            && self.date_range.is_none()
    }

    pub fn with_sources(mut self, sources: Vec<SourceType>) -> Self {
        self.sources = Some(sources);
        self
    }

    pub fn with_types(mut self, types: Vec<String>) -> Self {
        self.types = Some(types);
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = Some(authors);
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = Some(labels);
        self
    }

    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = Some(range);
        self
    }

    /// Observation types named in `types`, if any
    pub fn observation_types(&self) -> Vec<ObservationType> {
        active(&self.types)
            .unwrap_or_default()
            .iter()
            .filter_map(|t| ObservationType::from_query_word(t))
            .collect()
    }

    fn allows_kind(&self, kind: ContentKind, observation_type: Option<ObservationType>) -> bool {
        let Some(types) = active(&self.types) else {
            return true;
        };
        types.iter().any(|t| {
            t.parse::<ContentKind>().is_ok_and(|k| k == kind)
                || observation_type.is_some_and(|ot| ObservationType::from_query_word(t) == Some(ot))
        })
    }

    fn allows_source(&self, source: Option<SourceType>) -> bool {
        match active(&self.sources) {
            None => true,
            Some(sources) => source.is_some_and(|s| sources.contains(&s)),
        }
    }

    fn allows_author(&self, author: Option<&str>) -> bool {
        match active(&self.authors) {
            None => true,
            Some(authors) => author.is_some_and(|a| authors.iter().any(|x| x == a)),
        }
    }

    fn allows_labels(&self, labels: &[String]) -> bool {
        match active(&self.labels) {
            None => true,
            Some(wanted) => wanted
                .iter()
                .any(|w| labels.iter().any(|l| l.eq_ignore_ascii_case(w))),
        }
    }

    pub fn matches_chunk(&self, chunk: &Chunk) -> bool {
        self.allows_kind(ContentKind::Chunk, None)
            && self.allows_source(Some(chunk.source_type()))
            && self.allows_author(chunk.author_id.as_deref())
            && self.allows_labels(chunk.source.labels())
            && self
                .date_range
                .is_none_or(|range| range.contains(chunk.document_timestamp))
    }

    pub fn matches_observation(&self, observation: &Observation) -> bool {
        self.allows_kind(ContentKind::Observation, Some(observation.observation_type))
            && self.allows_source(Some(observation.source.source_type()))
            && self.allows_author(observation.actor_id.as_deref())
            && self.allows_labels(observation.source.labels())
            && self
                .date_range
                .is_none_or(|range| range.contains(observation.occurred_at))
    }

    /// Summaries carry no source, author or labels; those filters exclude them
    pub fn matches_summary(&self, summary: &Summary) -> bool {
        self.allows_kind(ContentKind::Summary, None)
            && self.allows_source(None)
            && self.allows_author(None)
            && self.allows_labels(&[])
            && self
                .date_range
                .is_none_or(|range| range.overlaps(summary.period_start, Some(summary.period_end)))
    }

    /// States carry no source, author or labels; those filters exclude them
    pub fn matches_state(&self, state: &TemporalState) -> bool {
        self.allows_kind(ContentKind::State, None)
            && self.allows_source(None)
            && self.allows_author(None)
            && self.allows_labels(&[])
            && self
                .date_range
                .is_none_or(|range| range.overlaps(state.valid_from, state.valid_to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ObservationEmbeddings, SourceMetadata};
    use chrono::{Duration, TimeZone};

    fn chunk(labels: &[&str]) -> Chunk {
        Chunk {
            id: "c1".to_string(),
            workspace_id: "ws".to_string(),
            document_id: "d1".to_string(),
            chunk_index: 0,
            external_id: "#12".to_string(),
            title: "Fix login".to_string(),
            content: "Fix login redirect".to_string(),
            source: SourceMetadata::Github {
                repository: "acme/api".to_string(),
                number: Some(12),
                path: None,
                labels: labels.iter().map(|l| l.to_string()).collect(),
            },
            url: None,
            author_id: Some("alice".to_string()),
            document_timestamp: Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap(),
            embedding_ref: None,
        }
    }

    fn incident() -> Observation {
        let at = Utc.with_ymd_and_hms(2026, 2, 3, 0, 0, 0).unwrap();
        Observation {
            id: "o1".to_string(),
            workspace_id: "ws".to_string(),
            observation_type: ObservationType::Incident,
            occurred_at: at,
            captured_at: at,
            actor_id: Some("bob".to_string()),
            source_actor: None,
            significance: 0.8,
            title: "API outage".to_string(),
            content: String::new(),
            summary: String::new(),
            source: SourceMetadata::Slack {
                channel: "ops".to_string(),
                thread_ts: None,
            },
            references: vec![],
            topics: vec![],
            embeddings: ObservationEmbeddings::default(),
        }
    }

    #[test]
    fn test_empty_filters_match_everything() {
        let filters = SearchFilters::default();
        assert!(filters.is_empty());
        assert!(filters.matches_chunk(&chunk(&[])));
        assert!(filters.matches_observation(&incident()));
    }

    #[test]
    fn test_or_within_field_and_across_fields() {
        let filters = SearchFilters::default()
            .with_sources(vec![SourceType::Github, SourceType::Slack])
            .with_authors(vec!["alice".to_string()]);

        assert!(filters.matches_chunk(&chunk(&[])));
        // Slack passes the source field but bob fails the author field
        assert!(!filters.matches_observation(&incident()));
    }

    #[test]
    fn test_type_filter_accepts_kinds_and_observation_types() {
        let incidents = SearchFilters::default().with_types(vec!["incident".to_string()]);
        assert!(incidents.matches_observation(&incident()));
        assert!(!incidents.matches_chunk(&chunk(&[])));

        let chunks = SearchFilters::default().with_types(vec!["chunk".to_string()]);
        assert!(chunks.matches_chunk(&chunk(&[])));
        assert!(!chunks.matches_observation(&incident()));
        assert_eq!(incidents.observation_types(), vec![ObservationType::Incident]);
    }

    #[test]
    fn test_labels_and_dates() {
        let filters = SearchFilters::default().with_labels(vec!["Security".to_string()]);
        assert!(filters.matches_chunk(&chunk(&["security", "auth"])));
        assert!(!filters.matches_chunk(&chunk(&["billing"])));

        let obs = incident();
        let range = DateRange::new(Some(obs.occurred_at), Some(obs.occurred_at + Duration::days(1)));
        let filters = SearchFilters::default().with_date_range(range);
        assert!(filters.matches_observation(&obs));
        assert!(!filters.matches_chunk(&chunk(&[])));

        let exclusive_end = DateRange::new(None, Some(obs.occurred_at));
        assert!(!exclusive_end.contains(obs.occurred_at));
    }
}
