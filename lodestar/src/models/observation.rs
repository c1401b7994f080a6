//! Neural-memory observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::source::{SourceMetadata, SourceReference, SourceType};

/// What kind of event an observation records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    Decision,
    Change,
    Incident,
    Highlight,
}

impl ObservationType {
    pub const ALL: [ObservationType; 4] = [
        Self::Decision,
        Self::Change,
        Self::Incident,
        Self::Highlight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decision => "decision",
            Self::Change => "change",
            Self::Incident => "incident",
            Self::Highlight => "highlight",
        }
    }

    /// Type prior used as the importance ranking component
    pub fn importance(&self) -> f32 {
        match self {
            Self::Incident => 1.0,
            Self::Decision => 0.8,
            Self::Change => 0.5,
            Self::Highlight => 0.4,
        }
    }

    /// Map a query word (singular or plural) to a type
    pub fn from_query_word(word: &str) -> Option<Self> {
        match word.to_lowercase().as_str() {
            "decision" | "decisions" => Some(Self::Decision),
            "change" | "changes" => Some(Self::Change),
            "incident" | "incidents" => Some(Self::Incident),
            "highlight" | "highlights" => Some(Self::Highlight),
            _ => None,
        }
    }
}

impl fmt::Display for ObservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObservationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_query_word(s).ok_or_else(|| format!("Unknown observation type: {}", s))
    }
}

/// Which embedded view of an observation matched
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObservationView {
    Title,
    Content,
    Summary,
}

impl ObservationView {
    pub const ALL: [ObservationView; 3] = [Self::Title, Self::Content, Self::Summary];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Content => "content",
            Self::Summary => "summary",
        }
    }
}

/// Vector-index keys for the three embedded views
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ObservationEmbeddings {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// The source-native identity that produced an observation, before actor resolution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceActorRef {
    pub source: SourceType,
    pub source_id: String,
}

/// An atomic, typed event extracted from source activity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    pub id: String,
    pub workspace_id: String,
    pub observation_type: ObservationType,
    /// When the event happened in the source
    pub occurred_at: DateTime<Utc>,
    /// When the platform recorded it; never earlier than `occurred_at`
    pub captured_at: DateTime<Utc>,
    /// Canonical actor, once resolved
    #[serde(default)]
    pub actor_id: Option<String>,
    #[serde(default)]
    pub source_actor: Option<SourceActorRef>,
    /// Significance in [0, 1]
    #[serde(default)]
    pub significance: f32,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: String,
    pub source: SourceMetadata,
    #[serde(default)]
    pub references: Vec<SourceReference>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub embeddings: ObservationEmbeddings,
}

impl Observation {
    /// Check the record-level invariants
    pub fn validate(&self) -> Result<(), String> {
        if self.occurred_at > self.captured_at {
            return Err(format!(
                "Observation {} occurred after it was captured",
                self.id
            ));
        }
        if !(0.0..=1.0).contains(&self.significance) {
            return Err(format!(
                "Observation {} significance {} outside [0, 1]",
                self.id, self.significance
            ));
        }
        Ok(())
    }

    /// Text of one embedded view
    pub fn view_text(&self, view: ObservationView) -> &str {
        match view {
            ObservationView::Title => &self.title,
            ObservationView::Content => &self.content,
            ObservationView::Summary => {
                if self.summary.is_empty() {
                    &self.content
                } else {
                    &self.summary
                }
            }
        }
    }

    /// Vector-index key of one embedded view
    pub fn view_ref(&self, view: ObservationView) -> Option<&str> {
        match view {
            ObservationView::Title => self.embeddings.title.as_deref(),
            ObservationView::Content => self.embeddings.content.as_deref(),
            ObservationView::Summary => self.embeddings.summary.as_deref(),
        }
    }

    /// Whether the observation mentions any of the given topic terms
    pub fn touches_topic(&self, terms: &[String]) -> bool {
        terms.iter().any(|term| {
            self.topics.iter().any(|topic| topic.eq_ignore_ascii_case(term))
                || self.title.to_lowercase().contains(term.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn observation() -> Observation {
        let now = Utc::now();
        Observation {
            id: "obs-1".to_string(),
            workspace_id: "ws".to_string(),
            observation_type: ObservationType::Incident,
            occurred_at: now - Duration::hours(1),
            captured_at: now,
            actor_id: None,
            source_actor: None,
            significance: 0.9,
            title: "Checkout outage".to_string(),
            content: "Payments failed for 20 minutes".to_string(),
            summary: String::new(),
            source: SourceMetadata::Slack {
                channel: "incidents".to_string(),
                thread_ts: None,
            },
            references: vec![],
            topics: vec!["payments".to_string()],
            embeddings: ObservationEmbeddings::default(),
        }
    }

    #[test]
    fn test_validate_capture_order() {
        let mut obs = observation();
        assert!(obs.validate().is_ok());
        obs.captured_at = obs.occurred_at - Duration::seconds(1);
        assert!(obs.validate().is_err());
    }

    #[test]
    fn test_summary_view_falls_back_to_content() {
        let obs = observation();
        assert_eq!(obs.view_text(ObservationView::Summary), obs.content);
    }

    #[test]
    fn test_type_from_plural() {
        assert_eq!(
            ObservationType::from_query_word("Incidents"),
            Some(ObservationType::Incident)
        );
        assert_eq!(ObservationType::from_query_word("incidental"), None);
    }
}
