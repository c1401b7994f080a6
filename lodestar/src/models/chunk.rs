//! Knowledge chunks

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::source::{SourceMetadata, SourceType};

/// A contiguous piece of an indexed source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub workspace_id: String,
    /// Parent document; chunks of one document share it
    pub document_id: String,
    /// Position within the parent document, starting at zero
    #[serde(default)]
    pub chunk_index: u32,
    /// Source-native identifier of the parent document (`#482`, `ENG-142`, a file path)
    pub external_id: String,
    pub title: String,
    pub content: String,
    pub source: SourceMetadata,
    #[serde(default)]
    pub url: Option<String>,
    /// Canonical actor who authored the parent document
    #[serde(default)]
    pub author_id: Option<String>,
    pub document_timestamp: DateTime<Utc>,
    /// Key into the vector index
    #[serde(default)]
    pub embedding_ref: Option<String>,
}

impl Chunk {
    /// Source type of the parent document
    pub fn source_type(&self) -> SourceType {
        self.source.source_type()
    }

    /// Text fed to lexical indexing and embedding
    pub fn indexed_text(&self) -> String {
        if self.chunk_index == 0 {
            format!("{}\n{}", self.title, self.content)
        } else {
            self.content.clone()
        }
    }

    /// Whether `identifier` addresses the parent document directly
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.external_id.eq_ignore_ascii_case(identifier)
            || self
                .source
                .identifiers()
                .iter()
                .any(|id| id.eq_ignore_ascii_case(identifier))
    }
}
