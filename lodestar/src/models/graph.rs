//! Typed relationship edges

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of node an edge endpoint refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Document,
    Chunk,
    Observation,
    Summary,
    Actor,
    Entity,
}

/// Edge endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef {
    pub kind: NodeKind,
    pub id: String,
}

impl NodeRef {
    pub fn new(kind: NodeKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.kind, self.id)
    }
}

/// Relationship label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Authored,
    Reviewed,
    AssignedTo,
    Mentions,
    References,
    Fixes,
    Resolves,
    Triggered,
    DependsOn,
    PartOf,
}

impl RelationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authored => "authored",
            Self::Reviewed => "reviewed",
            Self::AssignedTo => "assigned_to",
            Self::Mentions => "mentions",
            Self::References => "references",
            Self::Fixes => "fixes",
            Self::Resolves => "resolves",
            Self::Triggered => "triggered",
            Self::DependsOn => "depends_on",
            Self::PartOf => "part_of",
        }
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed, typed edge between two items
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphEdge {
    pub id: String,
    pub workspace_id: String,
    pub source: NodeRef,
    pub target: NodeRef,
    pub relation: RelationType,
    /// Confidence in [0, 1]
    pub confidence: f32,
    /// Traversal cost; cheaper edges are expanded first
    #[serde(default = "default_hop_cost")]
    pub hop_cost: f32,
    pub created_at: DateTime<Utc>,
}

fn default_hop_cost() -> f32 {
    1.0
}

impl GraphEdge {
    /// The endpoint opposite `node`, if `node` is on this edge
    pub fn other_end(&self, node: &NodeRef) -> Option<&NodeRef> {
        if &self.source == node {
            Some(&self.target)
        } else if &self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }
}
