//! BM25 lexical index over chunk tokens

use std::collections::HashMap;

const K1: f32 = 1.2;
const B: f32 = 0.75;

#[derive(Debug, Default, Clone)]
struct DocStats {
    length: u32,
    term_freqs: HashMap<String, u32>,
}

/// Inverted statistics for one workspace's chunks
#[derive(Debug, Default, Clone)]
pub struct LexicalIndex {
    docs: HashMap<String, DocStats>,
    doc_freqs: HashMap<String, u32>,
    total_length: u64,
}

impl LexicalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Index (or re-index) a document
    pub fn insert(&mut self, id: &str, tokens: &[String]) {
        self.remove(id);

        let mut term_freqs: HashMap<String, u32> = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token.clone()).or_default() += 1;
        }
        for term in term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_default() += 1;
        }
        self.total_length += tokens.len() as u64;
        self.docs.insert(
            id.to_string(),
            DocStats {
                length: tokens.len() as u32,
                term_freqs,
            },
        );
    }

    pub fn remove(&mut self, id: &str) {
        let Some(stats) = self.docs.remove(id) else {
            return;
        };
        self.total_length -= stats.length as u64;
        for term in stats.term_freqs.keys() {
            if let Some(df) = self.doc_freqs.get_mut(term) {
                *df -= 1;
                if *df == 0 {
                    self.doc_freqs.remove(term);
                }
            }
        }
    }

    fn idf(&self, term: &str) -> f32 {
        let n = self.docs.len() as f32;
        let df = self.doc_freqs.get(term).copied().unwrap_or(0) as f32;
        ((n - df + 0.5) / (df + 0.5) + 1.0).ln()
    }

    /// Raw BM25 scores of every document matching at least one term, best first
    pub fn search(&self, terms: &[String]) -> Vec<(String, f32)> {
        if self.docs.is_empty() || terms.is_empty() {
            return Vec::new();
        }
        let avg_length = self.total_length as f32 / self.docs.len() as f32;

        let mut results: Vec<(String, f32)> = self
            .docs
            .iter()
            .filter_map(|(id, stats)| {
                let score: f32 = terms
                    .iter()
                    .filter_map(|term| {
                        let tf = *stats.term_freqs.get(term)? as f32;
                        let norm = K1 * (1.0 - B + B * stats.length as f32 / avg_length.max(1.0));
                        Some(self.idf(term) * tf * (K1 + 1.0) / (tf + norm))
                    })
                    .sum();
                (score > 0.0).then(|| (id.clone(), score))
            })
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        results
    }
}
