//! Rule-based query classification
//!
//! Rules are ordered by specificity and the first family to match decides the mode:
//! literal identifiers, then actor markers, then temporal markers, then decision/incident
//! language. Nothing matching means [`RouterMode::Hybrid`]. Confidence is informational only.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Debug;

use super::RouterMode;
use super::temporal::has_temporal_marker;
use super::text::is_stopword;

/// Outcome of classifying one query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Classification {
    pub mode: RouterMode,
    pub confidence: f32,
    /// Name of the first rule that fired; `None` for the hybrid fallback
    pub matched_rule: Option<String>,
    /// More than one rule family matched
    pub ambiguous: bool,
    /// Literal identifiers found in the query, in order of appearance
    pub identifiers: Vec<String>,
    /// Names from @mentions and "by X" phrases
    pub actor_mentions: Vec<String>,
}

/// Maps a query to a router mode
///
/// Implementations must be pure: the same text always yields the same classification.
pub trait Classifier: Send + Sync + Debug {
    fn classify(&self, query: &str) -> Classification;
}

lazy_static! {
    static ref TICKET_KEY: Regex = Regex::new(r"\b[A-Z][A-Z0-9]{1,9}-\d+\b").unwrap();
    static ref ISSUE_NUMBER: Regex =
        Regex::new(r"(?:[A-Za-z0-9_.\-]+/[A-Za-z0-9_.\-]+)?#\d+\b").unwrap();
    static ref PATH_WITH_DIRS: Regex =
        Regex::new(r"(?:[A-Za-z0-9_.\-]+/)+[A-Za-z0-9_\-]+\.[A-Za-z0-9]{1,5}\b").unwrap();
    static ref FILE_NAME: Regex = Regex::new(
        r"\b[A-Za-z0-9_\-]+\.(?:rs|py|go|java|kt|rb|swift|cpp|tsx|jsx|md|toml|ya?ml|json|sql|sh|proto|tf)\b"
    )
    .unwrap();
    static ref MENTION: Regex = Regex::new(r"(?:^|[\s(,])@([A-Za-z0-9][A-Za-z0-9_.\-]*)").unwrap();
    static ref WHO_VERB: Regex = Regex::new(
        r"(?i)\bwho\s+(?:did|does|owns?|owned|reviewed|reviews|worked|works|wrote|writes|fixed|built|shipped|changed|maintains|knows|approved|merged|led|(?:is|was)\s+(?:working|responsible))\b"
    )
    .unwrap();
    static ref BY_NAME: Regex = Regex::new(r"(?i)\bby\s+([A-Za-z][A-Za-z0-9_.\-]*)").unwrap();
    static ref DECISION_LANGUAGE: Regex = Regex::new(
        r"(?i)\b(?:why\s+(?:did|do|does|was|were)\s+we|what\s+happened|outages?|incidents?|post-?mortems?|root\s+cause|decid(?:e|ed|ing)|decisions?|went\s+wrong|roll(?:ed)?[\s\-]?backs?|rolled\s+back|regressions?|downtime)\b"
    )
    .unwrap();

    /// Words that follow "by" without naming a person
    static ref NOT_A_NAME: HashSet<&'static str> = [
        "accident", "default", "design", "email", "far", "hand", "itself", "mistake", "now",
        "priority", "team", "then", "date", "day", "week", "month", "year", "yesterday",
        "tomorrow", "end", "way", "severity", "type", "source", "label", "status",
    ]
    .into_iter()
    .collect();
}

/// Literal identifiers in order of appearance, deduplicated
pub fn find_identifiers(query: &str) -> Vec<String> {
    let mut spans: Vec<(usize, String)> = Vec::new();
    for re in [&*TICKET_KEY, &*ISSUE_NUMBER, &*PATH_WITH_DIRS, &*FILE_NAME] {
        for m in re.find_iter(query) {
            // A file name inside an already captured path is the same identifier
            let inside = spans
                .iter()
                .any(|(start, text)| m.start() >= *start && m.end() <= start + text.len());
            if !inside {
                spans.push((m.start(), m.as_str().to_string()));
            }
        }
    }
    spans.sort_by_key(|(start, _)| *start);
    let mut seen = HashSet::new();
    spans
        .into_iter()
        .map(|(_, text)| text)
        .filter(|text| seen.insert(text.clone()))
        .collect()
}

/// Names from @mentions and "by X" phrases
pub fn find_actor_mentions(query: &str) -> Vec<String> {
    let mut names: Vec<String> = MENTION
        .captures_iter(query)
        .map(|caps| caps[1].trim_end_matches(['.', '-']).to_string())
        .collect();
    for caps in BY_NAME.captures_iter(query) {
        let name = caps[1].trim_end_matches(['.', '-']);
        let lower = name.to_lowercase();
        if !is_stopword(&lower) && !NOT_A_NAME.contains(lower.as_str()) {
            names.push(name.to_string());
        }
    }
    let mut seen = HashSet::new();
    names.retain(|name| seen.insert(name.to_lowercase()));
    names
}

/// The query with "who did"-style phrases and @mentions blanked out
pub fn strip_actor_markers(query: &str) -> String {
    let without_who = WHO_VERB.replace_all(query, " ");
    MENTION.replace_all(&without_who, " ").into_owned()
}

/// Deterministic first-match classifier
#[derive(Debug, Clone, Default)]
pub struct RuleClassifier;

impl RuleClassifier {
    pub fn new() -> Self {
        Self
    }
}

impl Classifier for RuleClassifier {
    fn classify(&self, query: &str) -> Classification {
        let identifiers = find_identifiers(query);
        let actor_mentions = find_actor_mentions(query);
        let who_marker = WHO_VERB.is_match(query);

        // (mode, confidence, rule) for every family that matched, most specific first
        let mut matched: Vec<(RouterMode, f32, &'static str)> = Vec::new();
        if !identifiers.is_empty() {
            matched.push((RouterMode::Knowledge, 0.95, "literal_identifier"));
        }
        if who_marker || !actor_mentions.is_empty() {
            let rule = if who_marker { "who_marker" } else { "actor_mention" };
            matched.push((RouterMode::Actor, 0.85, rule));
        }
        if has_temporal_marker(query) {
            matched.push((RouterMode::Temporal, 0.8, "temporal_marker"));
        }
        if DECISION_LANGUAGE.is_match(query) {
            matched.push((RouterMode::Neural, 0.7, "decision_language"));
        }

        let ambiguous = matched.len() > 1;
        let (mode, confidence, matched_rule) = match matched.first() {
            Some((mode, confidence, rule)) => {
                // Competing families lower confidence but never change the winner
                let penalty = 0.05 * (matched.len() - 1) as f32;
                (*mode, (confidence - penalty).max(0.5), Some(rule.to_string()))
            }
            None => (RouterMode::Hybrid, 0.5, None),
        };

        Classification {
            mode,
            confidence,
            matched_rule,
            ambiguous,
            identifiers,
            actor_mentions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode(query: &str) -> RouterMode {
        RuleClassifier::new().classify(query).mode
    }

    #[test]
    fn test_identifiers_route_to_knowledge() {
        assert_eq!(mode("#482"), RouterMode::Knowledge);
        assert_eq!(mode("what is ENG-142 about"), RouterMode::Knowledge);
        assert_eq!(mode("acme/api#12 review"), RouterMode::Knowledge);
        assert_eq!(mode("changes to src/auth/session.rs"), RouterMode::Knowledge);
        assert_eq!(mode("open Cargo.toml"), RouterMode::Knowledge);
    }

    #[test]
    fn test_actor_markers() {
        assert_eq!(mode("who worked on auth"), RouterMode::Actor);
        assert_eq!(mode("what did @jane ship"), RouterMode::Actor);
        assert_eq!(mode("PRs by bob"), RouterMode::Actor);
        // "by default" names nobody
        assert_eq!(mode("is tracing enabled by default"), RouterMode::Hybrid);
    }

    #[test]
    fn test_temporal_and_neural_markers() {
        assert_eq!(mode("yesterday incidents"), RouterMode::Temporal);
        assert_eq!(mode("deploys last week"), RouterMode::Temporal);
        assert_eq!(mode("why did we move auth to the gateway"), RouterMode::Neural);
        assert_eq!(mode("checkout outage"), RouterMode::Neural);
    }

    #[test]
    fn test_default_is_hybrid() {
        let classification = RuleClassifier::new().classify("auth gateway design");
        assert_eq!(classification.mode, RouterMode::Hybrid);
        assert_eq!(classification.confidence, 0.5);
        assert!(classification.matched_rule.is_none());
        assert!(!classification.ambiguous);
    }

    #[test]
    fn test_first_match_wins_and_flags_ambiguity() {
        let classification = RuleClassifier::new().classify("yesterday incidents");
        assert_eq!(classification.mode, RouterMode::Temporal);
        assert!(classification.ambiguous);

        let classification = RuleClassifier::new().classify("who fixed ENG-142 yesterday");
        assert_eq!(classification.mode, RouterMode::Knowledge);
        assert_eq!(classification.identifiers, vec!["ENG-142"]);
    }

    #[test]
    fn test_classification_is_pure() {
        let classifier = RuleClassifier::new();
        for query in ["who owns billing", "#7", "what happened last night", "misc"] {
            assert_eq!(classifier.classify(query), classifier.classify(query));
        }
    }

    #[test]
    fn test_identifier_extraction_dedups_nested_matches() {
        assert_eq!(
            find_identifiers("see acme/api#12 and acme/api#12 in docs/auth.md"),
            vec!["acme/api#12", "docs/auth.md"]
        );
    }

    #[test]
    fn test_actor_mentions() {
        assert_eq!(
            find_actor_mentions("changes by Jane and @bob.smith."),
            vec!["bob.smith", "Jane"]
        );
    }
}
