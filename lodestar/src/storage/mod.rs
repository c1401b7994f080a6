//! Storage abstractions and the in-memory implementation
//!
//! The retrieval engine consumes the store through the traits in [`traits`]; the aggregate
//! [`WorkspaceStore`] is what the engine holds. [`InMemoryStore`] implements all of them and is
//! populated from a [`snapshot::WorkspaceSnapshot`] or directly through the `put_*` methods.

pub mod cache;
pub mod errors;
pub mod filters;
pub mod lexical;
pub mod memory;
pub mod models;
pub mod snapshot;
pub mod traits;

pub use cache::CacheService;
pub use errors::{StorageError, StorageResult};
pub use filters::{DateRange, SearchFilters};
pub use memory::InMemoryStore;
pub use models::{VectorMatch, VectorNamespace, VectorQuery, VectorRecord};
pub use snapshot::{SnapshotReport, WorkspaceSnapshot};
pub use traits::{
    BaseStore, GraphStore, IdentityStore, KnowledgeStore, MergeOutcome, NeuralStore,
    SplitOutcome, TemporalStore, VectorIndex, WorkspaceStore,
};
