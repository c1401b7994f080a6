//! Query understanding: tokenization, classification, temporal parsing and entity resolution
//!
//! Classification is deterministic. The same query text always maps to the same
//! [`RouterMode`], and [`RouterMode::Hybrid`] is the fallback when no rule fires.

pub mod classifier;
pub mod processor;
pub mod similarity;
pub mod temporal;
pub mod text;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use classifier::{Classification, Classifier, RuleClassifier};
pub use processor::{ParsedQuery, QueryProcessor, ResolvedEntity};
pub use temporal::{Clock, FixedClock, SystemClock, TemporalContext, TemporalIntent, TimeWindow};

/// Strategy chosen per query; decides which candidate generators run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum RouterMode {
    /// Literal identifiers: ticket keys, issue numbers, file paths
    Knowledge,
    /// Who did or owns something
    Actor,
    /// Time-bounded questions
    Temporal,
    /// Decisions, incidents and their reasons
    Neural,
    /// Knowledge and neural together
    #[default]
    Hybrid,
}

impl RouterMode {
    pub const ALL: [RouterMode; 5] = [
        Self::Knowledge,
        Self::Actor,
        Self::Temporal,
        Self::Neural,
        Self::Hybrid,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Actor => "actor",
            Self::Temporal => "temporal",
            Self::Neural => "neural",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RouterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "knowledge" => Ok(Self::Knowledge),
            "actor" => Ok(Self::Actor),
            "temporal" => Ok(Self::Temporal),
            "neural" => Ok(Self::Neural),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("Unknown router mode: {}", s)),
        }
    }
}
