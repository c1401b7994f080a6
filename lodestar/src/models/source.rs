//! Source systems and their per-source metadata payloads

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Collaboration tool an item was indexed from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Code host (repositories, pull requests, issues, files)
    Github,
    /// Issue tracker
    Linear,
    /// Wiki
    Notion,
    /// Chat
    Slack,
}

impl SourceType {
    pub const ALL: [SourceType; 4] = [Self::Github, Self::Linear, Self::Notion, Self::Slack];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Github => "github",
            Self::Linear => "linear",
            Self::Notion => "notion",
            Self::Slack => "slack",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Self::Github),
            "linear" => Ok(Self::Linear),
            "notion" => Ok(Self::Notion),
            "slack" => Ok(Self::Slack),
            _ => Err(format!("Unknown source type: {}", s)),
        }
    }
}

/// Source-specific metadata, tagged by source type
///
/// Each variant carries exactly the fields its tool exposes so generators and the hydrator
/// can match exhaustively instead of probing an untyped map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum SourceMetadata {
    Github {
        /// `owner/name`
        repository: String,
        /// Issue or pull request number
        #[serde(default)]
        number: Option<u64>,
        /// File path for code chunks
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        labels: Vec<String>,
    },
    Linear {
        team: String,
        /// Ticket key such as `ENG-142`
        identifier: String,
        #[serde(default)]
        state: Option<String>,
        #[serde(default)]
        labels: Vec<String>,
    },
    Notion {
        space: String,
        #[serde(default)]
        breadcrumbs: Vec<String>,
    },
    Slack {
        channel: String,
        #[serde(default)]
        thread_ts: Option<String>,
    },
}

impl SourceMetadata {
    /// Source type of this payload
    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Github { .. } => SourceType::Github,
            Self::Linear { .. } => SourceType::Linear,
            Self::Notion { .. } => SourceType::Notion,
            Self::Slack { .. } => SourceType::Slack,
        }
    }

    /// Labels attached in the source tool (empty for tools without labels)
    pub fn labels(&self) -> &[String] {
        match self {
            Self::Github { labels, .. } | Self::Linear { labels, .. } => labels,
            Self::Notion { .. } | Self::Slack { .. } => &[],
        }
    }

    /// Literal identifiers a user could type to address this item directly
    pub fn identifiers(&self) -> Vec<String> {
        match self {
            Self::Github {
                repository,
                number,
                path,
                ..
            } => {
                let mut ids = Vec::new();
                if let Some(number) = number {
                    ids.push(format!("#{}", number));
                    ids.push(format!("{}#{}", repository, number));
                }
                if let Some(path) = path {
                    ids.push(path.clone());
                }
                ids
            }
            Self::Linear { identifier, .. } => vec![identifier.clone()],
            Self::Notion { .. } | Self::Slack { .. } => Vec::new(),
        }
    }

    /// Short human-readable location, used in snippets and rationale
    pub fn location(&self) -> String {
        match self {
            Self::Github {
                repository,
                number: Some(number),
                ..
            } => format!("{}#{}", repository, number),
            Self::Github {
                repository,
                path: Some(path),
                ..
            } => format!("{}:{}", repository, path),
            Self::Github { repository, .. } => repository.clone(),
            Self::Linear { identifier, .. } => identifier.clone(),
            Self::Notion { space, breadcrumbs } => {
                if breadcrumbs.is_empty() {
                    space.clone()
                } else {
                    format!("{} / {}", space, breadcrumbs.join(" / "))
                }
            }
            Self::Slack { channel, .. } => format!("#{}", channel),
        }
    }
}

/// Typed pointer to an item in a source tool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceReference {
    pub source_type: SourceType,
    pub external_id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_metadata_tagging() {
        let json = serde_json::json!({
            "source": "linear",
            "team": "ENG",
            "identifier": "ENG-142",
            "labels": ["auth"]
        });
        let metadata: SourceMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(metadata.source_type(), SourceType::Linear);
        assert_eq!(metadata.labels(), &["auth".to_string()]);
        assert_eq!(metadata.identifiers(), vec!["ENG-142".to_string()]);
    }

    #[test]
    fn test_github_identifiers() {
        let metadata = SourceMetadata::Github {
            repository: "acme/api".to_string(),
            number: Some(482),
            path: None,
            labels: vec![],
        };
        assert_eq!(
            metadata.identifiers(),
            vec!["#482".to_string(), "acme/api#482".to_string()]
        );
        assert_eq!(metadata.location(), "acme/api#482");
    }

    #[test]
    fn test_source_type_parse() {
        assert_eq!("GitHub".parse::<SourceType>().unwrap(), SourceType::Github);
        assert!("jira".parse::<SourceType>().is_err());
    }
}
