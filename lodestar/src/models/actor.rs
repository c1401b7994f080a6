//! Canonical actors, their per-source identities and derived profiles

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use super::observation::{Observation, ObservationType};
use super::source::SourceType;

/// Whether an actor is a person or an automation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorType {
    #[default]
    Human,
    Bot,
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Human => f.write_str("human"),
            Self::Bot => f.write_str("bot"),
        }
    }
}

/// A canonical person (or bot) unified across tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    pub id: String,
    pub workspace_id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub actor_type: ActorType,
    /// Set once this actor was merged into another
    #[serde(default)]
    pub merged_into: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Actor {
    /// Whether the actor still owns identities and observations
    pub fn is_active(&self) -> bool {
        self.merged_into.is_none()
    }
}

/// How a source identity was mapped to its canonical actor
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MappingMethod {
    /// Provider-supplied link between accounts
    ExplicitLink,
    /// Same email address as an existing identity
    EmailMatch,
    /// Fuzzy display-name match
    Heuristic,
    /// Set by an administrator (merge or split)
    Admin,
    /// No match; a fresh actor was created for this identity
    Created,
}

impl MappingMethod {
    /// Confidence every mapping with this method carries
    pub fn confidence(&self) -> f32 {
        match self {
            Self::ExplicitLink | Self::Admin | Self::Created => 1.0,
            Self::EmailMatch => 0.85,
            Self::Heuristic => 0.60,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitLink => "explicit_link",
            Self::EmailMatch => "email_match",
            Self::Heuristic => "heuristic",
            Self::Admin => "admin",
            Self::Created => "created",
        }
    }
}

impl fmt::Display for MappingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniqueness key of an identity row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub workspace_id: String,
    pub source: SourceType,
    pub source_id: String,
}

impl IdentityKey {
    pub fn new(
        workspace_id: impl Into<String>,
        source: SourceType,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            source,
            source_id: source_id.into(),
        }
    }
}

/// Mapping from one source-tool identity to a canonical actor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActorIdentity {
    pub workspace_id: String,
    pub source: SourceType,
    pub source_id: String,
    pub actor_id: String,
    pub mapping_method: MappingMethod,
    pub confidence: f32,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ActorIdentity {
    /// Create a mapping whose confidence follows its method
    pub fn new(key: IdentityKey, actor_id: impl Into<String>, method: MappingMethod) -> Self {
        Self {
            workspace_id: key.workspace_id,
            source: key.source,
            source_id: key.source_id,
            actor_id: actor_id.into(),
            mapping_method: method,
            confidence: method.confidence(),
            email: None,
            display_name: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    pub fn with_display_name(mut self, name: Option<String>) -> Self {
        self.display_name = name;
        self
    }

    pub fn key(&self) -> IdentityKey {
        IdentityKey::new(self.workspace_id.clone(), self.source, self.source_id.clone())
    }

    /// Re-point the mapping at another actor as an administrative action
    pub fn reassign(&mut self, actor_id: &str) {
        self.actor_id = actor_id.to_string();
        self.mapping_method = MappingMethod::Admin;
        self.confidence = MappingMethod::Admin.confidence();
    }
}

/// Derived view of an actor: expertise, contribution mix, activity pattern
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActorProfile {
    pub actor_id: String,
    pub workspace_id: String,
    /// Topic to weight in [0, 1]
    #[serde(default)]
    pub expertise: BTreeMap<String, f32>,
    #[serde(default)]
    pub contribution_types: BTreeMap<ObservationType, u32>,
    /// UTC hours of day with activity
    #[serde(default)]
    pub active_hours: BTreeSet<u8>,
    #[serde(default)]
    pub frequent_collaborators: Vec<String>,
    /// Vector-index key of the profile centroid
    #[serde(default)]
    pub centroid_ref: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub observation_count: usize,
}

impl ActorProfile {
    pub fn new(workspace_id: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            workspace_id: workspace_id.into(),
            ..Default::default()
        }
    }

    /// Highest expertise weight among the given topic terms
    pub fn expertise_for(&self, terms: &[String]) -> Option<(String, f32)> {
        terms
            .iter()
            .filter_map(|term| {
                self.expertise
                    .iter()
                    .find(|(topic, _)| topic.eq_ignore_ascii_case(term))
                    .map(|(topic, weight)| (topic.clone(), *weight))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Rebuild the profile from the actor's observations
    ///
    /// `related` holds other actors' observations; anyone sharing a source reference with the
    /// actor counts as a collaborator.
    pub fn recompute(&mut self, own: &[&Observation], related: &[&Observation]) {
        let mut topic_counts: HashMap<String, u32> = HashMap::new();
        self.contribution_types.clear();
        self.active_hours.clear();

        for obs in own {
            *self.contribution_types.entry(obs.observation_type).or_default() += 1;
            self.active_hours.insert(obs.occurred_at.hour() as u8);
            for topic in &obs.topics {
                *topic_counts.entry(topic.to_lowercase()).or_default() += 1;
            }
        }

        let max = topic_counts.values().copied().max().unwrap_or(0);
        self.expertise = topic_counts
            .into_iter()
            .map(|(topic, count)| (topic, count as f32 / max.max(1) as f32))
            .collect();

        let own_refs: HashSet<&str> = own
            .iter()
            .flat_map(|obs| obs.references.iter().map(|r| r.external_id.as_str()))
            .collect();
        let mut collaborator_counts: HashMap<&str, u32> = HashMap::new();
        for obs in related {
            let Some(actor_id) = obs.actor_id.as_deref() else {
                continue;
            };
            if actor_id == self.actor_id {
                continue;
            }
            if obs
                .references
                .iter()
                .any(|r| own_refs.contains(r.external_id.as_str()))
            {
                *collaborator_counts.entry(actor_id).or_default() += 1;
            }
        }
        let mut collaborators: Vec<(&str, u32)> = collaborator_counts.into_iter().collect();
        collaborators.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        self.frequent_collaborators = collaborators
            .into_iter()
            .take(5)
            .map(|(id, _)| id.to_string())
            .collect();

        self.observation_count = own.len();
        let n = own.len() as f32;
        self.confidence = n / (n + 5.0);
    }
}
