//! Answer synthesis strategies
//!
//! The engine hands the ranked, hydrated sources to an [`AnswerSynthesizer`] and streams the
//! segments it returns. [`ExtractiveSynthesizer`] is the deterministic baseline: it quotes the
//! most relevant sentence of each top source and cites it. A generative model can be plugged in
//! behind the same trait.

use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Debug;

use super::types::{Citation, SearchResult};
use crate::Result;
use crate::query::text::tokenize;

/// Answer text when no source was found
pub const NO_ANSWER: &str = "No relevant information was found for this query.";

/// A synthesized answer, split into the pieces that are streamed
#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub segments: Vec<String>,
    pub citations: Vec<Citation>,
}

impl Synthesis {
    pub fn text(&self) -> String {
        self.segments.concat()
    }
}

#[async_trait]
pub trait AnswerSynthesizer: Send + Sync + Debug {
    async fn synthesize(&self, query: &str, sources: &[SearchResult]) -> Result<Synthesis>;
}

#[derive(Debug, Clone)]
pub struct ExtractiveSynthesizer {
    max_sources: usize,
}

impl Default for ExtractiveSynthesizer {
    fn default() -> Self {
        Self { max_sources: 3 }
    }
}

fn sentences(text: &str) -> Vec<&str> {
    text.split_inclusive(['.', '!', '?', '\n'])
        .map(|s| s.trim())
        .filter(|s| s.chars().any(char::is_alphanumeric))
        .collect()
}

impl ExtractiveSynthesizer {
    pub fn new(max_sources: usize) -> Self {
        Self {
            max_sources: max_sources.max(1),
        }
    }

    /// Sentence sharing the most terms with the query; the first sentence on a tie
    fn best_sentence(terms: &HashSet<String>, source: &SearchResult) -> String {
        let snippet = source.snippet.trim_start_matches("...");
        let candidates = sentences(snippet);
        let best = candidates
            .iter()
            .enumerate()
            .max_by_key(|(idx, sentence)| {
                let overlap = tokenize(sentence)
                    .into_iter()
                    .filter(|t| terms.contains(t))
                    .count();
                (overlap, std::cmp::Reverse(*idx))
            })
            .map(|(_, s)| s.to_string());

        let sentence = best.unwrap_or_else(|| source.title.clone());
        let sentence = sentence.trim_end_matches("...").trim_end();
        if sentence.ends_with(['.', '!', '?']) {
            sentence.to_string()
        } else {
            format!("{}.", sentence)
        }
    }
}

#[async_trait]
impl AnswerSynthesizer for ExtractiveSynthesizer {
    async fn synthesize(&self, query: &str, sources: &[SearchResult]) -> Result<Synthesis> {
        if sources.is_empty() {
            return Ok(Synthesis {
                segments: vec![NO_ANSWER.to_string()],
                citations: Vec::new(),
            });
        }

        let terms: HashSet<String> = tokenize(query).into_iter().collect();
        let mut segments = Vec::new();
        let mut citations = Vec::new();
        for (idx, source) in sources.iter().take(self.max_sources).enumerate() {
            let index = idx + 1;
            let sentence = Self::best_sentence(&terms, source);
            let separator = if idx == 0 { "" } else { " " };
            segments.push(format!("{}{} [{}]", separator, sentence, index));
            citations.push(Citation {
                index,
                id: source.id.clone(),
                title: source.title.clone(),
                url: source.source.url.clone(),
            });
        }
        Ok(Synthesis {
            segments,
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::SourceDescriptor;
    use crate::models::{ContentKind, SourceType};

    fn result(id: &str, title: &str, snippet: &str) -> SearchResult {
        SearchResult {
            id: id.to_string(),
            result_type: ContentKind::Chunk,
            score: 0.5,
            title: title.to_string(),
            snippet: snippet.to_string(),
            highlights: vec![],
            source: SourceDescriptor {
                source_type: Some(SourceType::Github),
                id: "#1".to_string(),
                url: Some("https://github.com/acme/api/pull/1".to_string()),
            },
            occurred_at: None,
            captured_at: None,
            actor: None,
            rationale: None,
        }
    }

    #[tokio::test]
    async fn test_cites_the_most_relevant_sentence() {
        let sources = vec![
            result(
                "c1",
                "Gateway RFC",
                "We reviewed options. Auth moved to the gateway to centralise tokens. Rollout is done.",
            ),
            result("c2", "Runbook", "Restart the gateway pods"),
        ];
        let synthesis = ExtractiveSynthesizer::default()
            .synthesize("why did auth move to the gateway", &sources)
            .await
            .unwrap();

        assert_eq!(
            synthesis.text(),
            "Auth moved to the gateway to centralise tokens. [1] Restart the gateway pods. [2]"
        );
        assert_eq!(synthesis.citations.len(), 2);
        assert_eq!(synthesis.citations[1].id, "c2");
        assert!(synthesis.citations[0].url.is_some());
    }

    #[tokio::test]
    async fn test_no_sources_answers_plainly() {
        let synthesis = ExtractiveSynthesizer::new(2).synthesize("anything", &[]).await.unwrap();
        assert_eq!(synthesis.text(), NO_ANSWER);
        assert!(synthesis.citations.is_empty());
    }
}
