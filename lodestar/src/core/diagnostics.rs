//! Per-query diagnostics attached to every response

use serde::Serialize;
use std::fmt;

use crate::generators::{GeneratorReport, GeneratorStatus};
use crate::query::RouterMode;
use crate::query::processor::EmbeddingStatus;
use crate::search::RerankStatus;

/// Degradations a caller may want to react to; none of them abort the query
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    /// More than one classification rule matched
    ClassificationAmbiguous,
    GeneratorTimeout,
    GeneratorError,
    RerankUnavailable,
    EmbeddingUnavailable,
    /// At least one generator contributed nothing; results are partial
    PartialResults,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClassificationAmbiguous => "CLASSIFICATION_AMBIGUOUS",
            Self::GeneratorTimeout => "GENERATOR_TIMEOUT",
            Self::GeneratorError => "GENERATOR_ERROR",
            Self::RerankUnavailable => "RERANK_UNAVAILABLE",
            Self::EmbeddingUnavailable => "EMBEDDING_UNAVAILABLE",
            Self::PartialResults => "PARTIAL_RESULTS",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Mode the query ran in
    pub mode: RouterMode,
    /// Mode the classifier chose; differs from `mode` when the caller forced one
    pub classified_mode: RouterMode,
    pub confidence: f32,
    pub matched_rule: Option<String>,
    pub ambiguous: bool,
    pub embedding: EmbeddingStatus,
    pub generators: Vec<GeneratorReport>,
    pub rerank: RerankStatus,
    pub codes: Vec<DiagnosticCode>,
    /// Distinct candidates after fusion
    pub candidates: usize,
    pub total_ms: u64,
}

impl Diagnostics {
    /// Derive the diagnostic codes from the recorded stage outcomes
    pub fn collect_codes(&mut self) {
        let mut codes = Vec::new();
        if self.ambiguous {
            codes.push(DiagnosticCode::ClassificationAmbiguous);
        }
        if matches!(self.embedding, EmbeddingStatus::Unavailable(_)) {
            codes.push(DiagnosticCode::EmbeddingUnavailable);
        }
        let status_seen = |status| self.generators.iter().any(|g| g.status == status);
        if status_seen(GeneratorStatus::Timeout) {
            codes.push(DiagnosticCode::GeneratorTimeout);
        }
        if status_seen(GeneratorStatus::Error) {
            codes.push(DiagnosticCode::GeneratorError);
        }
        if matches!(self.rerank, RerankStatus::Unavailable { .. }) {
            codes.push(DiagnosticCode::RerankUnavailable);
        }
        if status_seen(GeneratorStatus::Timeout) || status_seen(GeneratorStatus::Error) {
            codes.push(DiagnosticCode::PartialResults);
        }
        self.codes = codes;
    }

    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.codes.contains(&code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::GeneratorKind;

    fn diagnostics() -> Diagnostics {
        Diagnostics {
            mode: RouterMode::Hybrid,
            classified_mode: RouterMode::Hybrid,
            confidence: 0.5,
            matched_rule: None,
            ambiguous: false,
            embedding: EmbeddingStatus::Computed,
            generators: vec![GeneratorReport {
                name: GeneratorKind::Knowledge,
                status: GeneratorStatus::Ok,
                candidates: 4,
                elapsed_ms: 3,
                message: None,
            }],
            rerank: RerankStatus::NotRequested,
            codes: vec![],
            candidates: 4,
            total_ms: 5,
        }
    }

    #[test]
    fn test_clean_run_has_no_codes() {
        let mut d = diagnostics();
        d.collect_codes();
        assert!(d.codes.is_empty());
    }

    #[test]
    fn test_degradations_become_codes() {
        let mut d = diagnostics();
        d.ambiguous = true;
        d.generators.push(GeneratorReport {
            name: GeneratorKind::Neural,
            status: GeneratorStatus::Timeout,
            candidates: 0,
            elapsed_ms: 50,
            message: Some("timed out".to_string()),
        });
        d.rerank = RerankStatus::Unavailable {
            message: "down".to_string(),
        };
        d.collect_codes();
        assert_eq!(
            d.codes,
            vec![
                DiagnosticCode::ClassificationAmbiguous,
                DiagnosticCode::GeneratorTimeout,
                DiagnosticCode::RerankUnavailable,
                DiagnosticCode::PartialResults,
            ]
        );

        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["codes"][0], "CLASSIFICATION_AMBIGUOUS");
        assert_eq!(json["rerank"]["status"], "unavailable");
    }
}
