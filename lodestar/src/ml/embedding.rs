//! Embedding provider interface and the local hashing embedder

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::fmt::Debug;

use super::error::{MLError, Result};
use crate::query::text::tokenize;

/// Type for embedding vectors
pub type EmbeddingVector = Vec<f32>;

/// Generates dense vectors for text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync + Debug {
    /// Provider name, used in logs and diagnostics
    fn name(&self) -> &str;

    /// Length of every vector this provider returns
    fn dimensions(&self) -> usize;

    /// Embed a batch of texts, one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| MLError::embedding("Provider returned no vector"))
    }
}

/// Scale a vector to unit length in place; zero vectors are left untouched
pub fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Deterministic feature-hashing embedder
///
/// Every unigram and adjacent bigram of the tokenized text is hashed with SHA-256 into one of
/// `dimensions` buckets with a hash-derived sign, then the vector is L2-normalised. Identical
/// texts always produce identical vectors and texts sharing terms score positive cosine.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(MLError::configuration(
                "Hashing embedder needs at least one dimension",
            ));
        }
        Ok(Self { dimensions })
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign * weight;
    }

    /// Embed synchronously
    pub fn embed_text(&self, text: &str) -> EmbeddingVector {
        let mut vector = vec![0.0; self.dimensions];
        let tokens = tokenize(text);
        for token in &tokens {
            self.add_feature(&mut vector, token, 1.0);
        }
        for pair in tokens.windows(2) {
            self.add_feature(&mut vector, &format!("{} {}", pair[0], pair[1]), 0.5);
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn name(&self) -> &str {
        "hashing"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}
