//! Engine entry points and the shapes of their requests and responses

pub mod diagnostics;
pub mod engine;
pub mod hydrator;
pub mod synthesizer;
pub mod types;

pub use diagnostics::{DiagnosticCode, Diagnostics};
pub use engine::{RetrievalEngine, RetrievalEngineBuilder};
pub use hydrator::{Hydrated, Hydrator};
pub use synthesizer::{AnswerSynthesizer, ExtractiveSynthesizer, Synthesis};
pub use types::{
    ActorDescriptor, ActorExpertise, AnswerEvent, AnswerRequest, AnswerResponse, Citation,
    ContentItem, ContentRef, ContentsRequest, ContentsResponse, Rationale, RelatedItem,
    SearchRequest, SearchResponse, SearchResult, SourceDescriptor,
};
