//! Window summaries over observations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Synthesized summary of the observations on one topic within a time window
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Summary {
    pub id: String,
    pub workspace_id: String,
    pub topic: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub observation_ids: Vec<String>,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub content: String,
    #[serde(default)]
    pub embedding_ref: Option<String>,
    #[serde(default)]
    pub confidence: f32,
}

impl Summary {
    /// Confidence for a summary built from `observation_count` observations
    pub fn confidence_for(observation_count: usize) -> f32 {
        let n = observation_count as f32;
        n / (n + 3.0)
    }

    /// Title shown in results
    pub fn title(&self) -> String {
        format!(
            "{} ({} to {})",
            self.topic,
            self.period_start.format("%Y-%m-%d"),
            self.period_end.format("%Y-%m-%d")
        )
    }
}
