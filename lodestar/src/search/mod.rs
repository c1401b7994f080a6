//! Ranking stages after candidate generation
//!
//! - [`fusion`]: weighted fusion of per-generator component scores, deduplication and ordering
//! - [`rerank`]: optional cross-encoder pass over the fused top-K

pub mod fusion;
pub mod rerank;

pub use fusion::{Contributions, FusionScorer, ScoredCandidate, rank_order};
pub use rerank::{
    RemoteReranker, RerankDocument, RerankStage, RerankStatus, Reranker, VectorCrossEncoder,
    create_reranker,
};
