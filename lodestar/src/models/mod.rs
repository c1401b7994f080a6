//! Data model of the indexed workspace.
//!
//! Every entity is scoped by `workspace_id`; stores never return rows from another workspace.
//! The engine only reads these records. The exceptions are administrative actor merge/split and
//! the temporal/graph write paths that keep the caches coherent.

pub mod actor;
pub mod chunk;
pub mod graph;
pub mod observation;
pub mod source;
pub mod summary;
pub mod temporal;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use actor::{Actor, ActorIdentity, ActorProfile, ActorType, IdentityKey, MappingMethod};
pub use chunk::Chunk;
pub use graph::{GraphEdge, NodeKind, NodeRef, RelationType};
pub use observation::{
    Observation, ObservationEmbeddings, ObservationType, ObservationView, SourceActorRef,
};
pub use source::{SourceMetadata, SourceReference, SourceType};
pub use summary::Summary;
pub use temporal::{TemporalState, TimelineViolation, verify_timeline};

/// Kind of item a search result can point at
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// A chunk of a knowledge document
    Chunk,
    /// A neural-memory observation
    Observation,
    /// A summary over observations
    Summary,
    /// A temporal state row
    State,
}

impl ContentKind {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Observation => "observation",
            Self::Summary => "summary",
            Self::State => "state",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chunk" => Ok(Self::Chunk),
            "observation" => Ok(Self::Observation),
            "summary" => Ok(Self::Summary),
            "state" => Ok(Self::State),
            _ => Err(format!("Unknown content kind: {}", s)),
        }
    }
}
