//! Vector-index records and queries

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Logical partition of the vector index
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum VectorNamespace {
    Chunks,
    Observations,
    Summaries,
    Profiles,
}

impl fmt::Display for VectorNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Chunks => "chunks",
            Self::Observations => "observations",
            Self::Summaries => "summaries",
            Self::Profiles => "profiles",
        };
        f.write_str(name)
    }
}

/// One stored embedding
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    /// Embedding reference held by the owning entity
    pub id: String,
    pub workspace_id: String,
    pub namespace: VectorNamespace,
    /// View within the namespace (`title`, `content`, `summary`, `centroid`, ...)
    pub view: String,
    /// Id of the chunk, observation, summary or actor the vector belongs to
    pub entity_id: String,
    pub vector: Vec<f32>,
}

/// Nearest-neighbour query keyed by workspace + namespace + view
#[derive(Debug, Clone)]
pub struct VectorQuery<'a> {
    pub workspace_id: &'a str,
    pub namespace: VectorNamespace,
    /// Restrict to one view; `None` searches every view of the namespace
    pub view: Option<&'a str>,
    pub vector: &'a [f32],
    pub limit: usize,
    /// Only entities in this set are eligible
    pub allowed_ids: Option<&'a HashSet<String>>,
}

/// A vector hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorMatch {
    pub entity_id: String,
    pub embedding_ref: String,
    pub view: String,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Cosine similarity; zero for mismatched or zero-length vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
