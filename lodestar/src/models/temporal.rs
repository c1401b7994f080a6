//! Bi-temporal state records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Value of one state dimension of an entity over a validity interval
///
/// `valid_from`/`valid_to` describe when the state held in the world; `created_at` is when the
/// platform recorded it. The interval is half-open: `[valid_from, valid_to)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalState {
    pub id: String,
    pub workspace_id: String,
    /// Kind of entity (`project`, `ticket`, `service`, ...)
    pub entity_type: String,
    pub entity_id: String,
    /// State dimension (`status`, `owner`, `priority`, ...)
    pub state_type: String,
    pub state_value: String,
    pub valid_from: DateTime<Utc>,
    #[serde(default)]
    pub valid_to: Option<DateTime<Utc>>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source_observation_id: Option<String>,
}

impl TemporalState {
    /// Whether the state held at `at`
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && self.valid_to.is_none_or(|to| at < to)
    }

    /// Whether the validity interval intersects `[start, end)`
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.valid_from < end && self.valid_to.is_none_or(|to| to > start)
    }

    /// Text used for display and lexical matching
    pub fn describe(&self) -> String {
        format!(
            "{} {} {} is {}",
            self.entity_type, self.entity_id, self.state_type, self.state_value
        )
    }
}

/// A broken timeline for one (entity, state type)
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineViolation {
    MultipleCurrent {
        entity_id: String,
        state_type: String,
    },
    CurrentWithEnd {
        state_id: String,
    },
    OpenButNotCurrent {
        state_id: String,
    },
    InvertedRange {
        state_id: String,
    },
    Overlap {
        first: String,
        second: String,
    },
}

impl fmt::Display for TimelineViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MultipleCurrent {
                entity_id,
                state_type,
            } => write!(
                f,
                "more than one current '{}' state for {}",
                state_type, entity_id
            ),
            Self::CurrentWithEnd { state_id } => {
                write!(f, "current state {} has a valid_to", state_id)
            }
            Self::OpenButNotCurrent { state_id } => {
                write!(f, "state {} has no valid_to but is not current", state_id)
            }
            Self::InvertedRange { state_id } => {
                write!(f, "state {} ends before it starts", state_id)
            }
            Self::Overlap { first, second } => {
                write!(f, "states {} and {} overlap", first, second)
            }
        }
    }
}

/// Check the timeline invariants over a set of states
///
/// Per (entity, state type): at most one current row, current rows are open-ended, and
/// validity intervals never overlap.
pub fn verify_timeline(states: &[TemporalState]) -> Result<(), TimelineViolation> {
    let mut groups: HashMap<(&str, &str), Vec<&TemporalState>> = HashMap::new();
    for state in states {
        if let Some(to) = state.valid_to
            && to < state.valid_from
        {
            return Err(TimelineViolation::InvertedRange {
                state_id: state.id.clone(),
            });
        }
        match (state.is_current, state.valid_to) {
            (true, Some(_)) => {
                return Err(TimelineViolation::CurrentWithEnd {
                    state_id: state.id.clone(),
                });
            }
            (false, None) => {
                return Err(TimelineViolation::OpenButNotCurrent {
                    state_id: state.id.clone(),
                });
            }
            _ => {}
        }
        groups
            .entry((state.entity_id.as_str(), state.state_type.as_str()))
            .or_default()
            .push(state);
    }

    for ((entity_id, state_type), mut rows) in groups {
        if rows.iter().filter(|s| s.is_current).count() > 1 {
            return Err(TimelineViolation::MultipleCurrent {
                entity_id: entity_id.to_string(),
                state_type: state_type.to_string(),
            });
        }
        rows.sort_by_key(|s| s.valid_from);
        for pair in rows.windows(2) {
            let (first, second) = (pair[0], pair[1]);
            if first.valid_to.is_none_or(|to| to > second.valid_from) {
                return Err(TimelineViolation::Overlap {
                    first: first.id.clone(),
                    second: second.id.clone(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn state(id: &str, from_day: u32, to_day: Option<u32>) -> TemporalState {
        let day = |d: u32| Utc.with_ymd_and_hms(2026, 1, d, 0, 0, 0).unwrap();
        TemporalState {
            id: id.to_string(),
            workspace_id: "ws".to_string(),
            entity_type: "project".to_string(),
            entity_id: "atlas".to_string(),
            state_type: "status".to_string(),
            state_value: id.to_string(),
            valid_from: day(from_day),
            valid_to: to_day.map(day),
            is_current: to_day.is_none(),
            created_at: day(from_day),
            source_observation_id: None,
        }
    }

    #[test]
    fn test_half_open_interval() {
        let s = state("planned", 1, Some(5));
        assert!(s.contains(s.valid_from));
        assert!(!s.contains(s.valid_to.unwrap()));
        assert!(s.contains(s.valid_to.unwrap() - Duration::seconds(1)));
    }

    #[test]
    fn test_valid_timeline() {
        let states = vec![
            state("planned", 1, Some(5)),
            state("active", 5, Some(9)),
            state("done", 9, None),
        ];
        assert!(verify_timeline(&states).is_ok());
    }

    #[test]
    fn test_overlap_detected() {
        let states = vec![state("planned", 1, Some(6)), state("active", 5, None)];
        assert!(matches!(
            verify_timeline(&states),
            Err(TimelineViolation::Overlap { .. })
        ));
    }

    #[test]
    fn test_two_current_rows_detected() {
        let states = vec![state("a", 1, None), state("b", 5, None)];
        assert!(matches!(
            verify_timeline(&states),
            Err(TimelineViolation::MultipleCurrent { .. })
        ));
    }
}
