//! Configuration model definitions.
//!
//! This module contains the configuration structures for all Lodestar components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration structure for Lodestar.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LodestarConfig {
    /// Query pipeline limits and per-stage budgets
    pub retrieval: RetrievalConfig,

    /// Fusion weights and recency decay
    pub fusion: FusionConfig,

    /// Optional rerank stage
    pub rerank: RerankConfig,

    /// Actor identity resolution
    pub identity: IdentityConfig,

    /// Read-through caches for temporal state and graph adjacency
    pub cache: CacheConfig,

    /// Machine learning configuration
    pub ml: MLConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Query pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the request sets no limit
    pub default_limit: usize,

    /// Upper bound on a requested limit
    pub max_limit: usize,

    /// Candidates each generator may return before fusion
    pub candidate_pool: usize,

    /// Budget for the knowledge generator
    #[serde(with = "humantime_serde")]
    pub knowledge_timeout: Duration,

    /// Budget for the neural generator
    #[serde(with = "humantime_serde")]
    pub neural_timeout: Duration,

    /// Budget for the temporal generator
    #[serde(with = "humantime_serde")]
    pub temporal_timeout: Duration,

    /// Budget for the graph generator
    #[serde(with = "humantime_serde")]
    pub graph_timeout: Duration,

    /// Budget for computing the query embedding
    #[serde(with = "humantime_serde")]
    pub embedding_timeout: Duration,

    /// Graph expansion settings
    pub graph: GraphExpansionConfig,

    /// Actor-mode fan-out
    pub actor: ActorModeConfig,

    /// Minimum weighted contribution for a signal to be explained in the rationale
    pub rationale_threshold: f32,

    /// Maximum characters in a result snippet
    pub snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
            candidate_pool: 200,
            knowledge_timeout: Duration::from_millis(50),
            neural_timeout: Duration::from_millis(50),
            temporal_timeout: Duration::from_millis(50),
            graph_timeout: Duration::from_millis(15),
            embedding_timeout: Duration::from_millis(20),
            graph: GraphExpansionConfig::default(),
            actor: ActorModeConfig::default(),
            rationale_threshold: 0.05,
            snippet_chars: 240,
        }
    }
}

/// Bounded-hop graph expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphExpansionConfig {
    /// Maximum hops from a seed (hard cap 2)
    pub max_hops: usize,

    /// Boost multiplier per hop, index 0 is hop 1
    pub hop_factors: Vec<f32>,

    /// Maximum edges expanded per node
    pub max_fan_out: usize,

    /// Top candidates used as seeds when no entity was resolved
    pub seed_count: usize,
}

impl Default for GraphExpansionConfig {
    fn default() -> Self {
        Self {
            max_hops: 2,
            hop_factors: vec![1.0, 0.6],
            max_fan_out: 25,
            seed_count: 3,
        }
    }
}

impl GraphExpansionConfig {
    /// Boost factor for a hop distance; zero beyond the configured hops
    pub fn hop_factor(&self, hop: usize) -> f32 {
        if hop == 0 || hop > self.max_hops {
            return 0.0;
        }
        self.hop_factors.get(hop - 1).copied().unwrap_or(0.0)
    }
}

/// Actor-mode fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorModeConfig {
    /// Actors considered, ranked by topic expertise
    pub top_actors: usize,

    /// Observations surfaced per actor
    pub observations_per_actor: usize,
}

impl Default for ActorModeConfig {
    fn default() -> Self {
        Self {
            top_actors: 3,
            observations_per_actor: 5,
        }
    }
}

/// Fusion weights for one router mode.
///
/// The seven weights must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FusionWeights {
    pub knowledge: f32,
    pub neural: f32,
    pub temporal: f32,
    pub actor: f32,
    pub graph: f32,
    pub recency: f32,
    pub importance: f32,
}

impl FusionWeights {
    pub const fn new(
        knowledge: f32,
        neural: f32,
        temporal: f32,
        actor: f32,
        graph: f32,
        recency: f32,
        importance: f32,
    ) -> Self {
        Self {
            knowledge,
            neural,
            temporal,
            actor,
            graph,
            recency,
            importance,
        }
    }

    /// Weights as a fixed-order array
    pub fn as_array(&self) -> [f32; 7] {
        [
            self.knowledge,
            self.neural,
            self.temporal,
            self.actor,
            self.graph,
            self.recency,
            self.importance,
        ]
    }

    pub fn sum(&self) -> f32 {
        self.as_array().iter().sum()
    }
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self::new(0.30, 0.25, 0.15, 0.10, 0.10, 0.07, 0.03)
    }
}

/// Weight table keyed by router mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ModeWeightTable {
    pub hybrid: FusionWeights,
    pub knowledge: FusionWeights,
    pub neural: FusionWeights,
    pub temporal: FusionWeights,
    pub actor: FusionWeights,
}

impl Default for ModeWeightTable {
    fn default() -> Self {
        Self {
            hybrid: FusionWeights::default(),
            knowledge: FusionWeights::new(0.50, 0.10, 0.05, 0.05, 0.20, 0.07, 0.03),
            neural: FusionWeights::new(0.15, 0.40, 0.10, 0.10, 0.10, 0.10, 0.05),
            temporal: FusionWeights::new(0.15, 0.20, 0.30, 0.05, 0.05, 0.20, 0.05),
            actor: FusionWeights::new(0.10, 0.20, 0.05, 0.40, 0.10, 0.10, 0.05),
        }
    }
}

impl ModeWeightTable {
    /// All rows with their mode names
    pub fn rows(&self) -> [(&'static str, &FusionWeights); 5] {
        [
            ("hybrid", &self.hybrid),
            ("knowledge", &self.knowledge),
            ("neural", &self.neural),
            ("temporal", &self.temporal),
            ("actor", &self.actor),
        ]
    }
}

/// Fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Per-mode weight table
    pub weights: ModeWeightTable,

    /// Recency decay constant in hours: `exp(-age / half_life)`
    pub recency_half_life_hours: f64,

    /// Share of the lexical score inside the knowledge component
    pub knowledge_lexical_weight: f32,

    /// Share of the vector score inside the knowledge component
    pub knowledge_vector_weight: f32,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: ModeWeightTable::default(),
            recency_half_life_hours: 168.0,
            knowledge_lexical_weight: 0.5,
            knowledge_vector_weight: 0.5,
        }
    }
}

/// Blend applied to reranked candidates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RerankBlend {
    pub rerank: f32,
    pub vector: f32,
    pub recency: f32,
    pub importance: f32,
}

impl Default for RerankBlend {
    fn default() -> Self {
        Self {
            rerank: 0.4,
            vector: 0.3,
            recency: 0.2,
            importance: 0.1,
        }
    }
}

impl RerankBlend {
    pub fn sum(&self) -> f32 {
        self.rerank + self.vector + self.recency + self.importance
    }
}

/// Which rerank strategy to use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RerankServiceType {
    /// In-process vector cross-encoder
    Vector,

    /// Remote cross-encoder rerank service
    Remote,
}

/// Rerank configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Rerank only runs when the fused set is larger than this
    pub min_candidates: usize,

    /// Number of top fused candidates to rerank
    pub top_k: usize,

    /// Time budget for the rerank call
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,

    pub blend: RerankBlend,

    pub service_type: RerankServiceType,

    /// Remote service URL (if using remote)
    pub service_url: Option<String>,

    /// Remote model name
    pub model_name: String,

    /// Bearer token for the remote service
    pub api_key: Option<String>,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            min_candidates: 5,
            top_k: 50,
            timeout: Duration::from_millis(30),
            blend: RerankBlend::default(),
            service_type: RerankServiceType::Vector,
            service_url: None,
            model_name: "rerank-english-v3.0".to_string(),
            api_key: None,
        }
    }
}

/// Actor identity resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Minimum normalized-name similarity for a heuristic match
    pub name_similarity_threshold: f32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            name_similarity_threshold: 0.8,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether the read-through caches are used
    pub enabled: bool,

    /// Entries in the current-state cache
    pub state_capacity: usize,

    /// Entries in the adjacency cache
    pub adjacency_capacity: usize,

    /// Time-to-live of a cached entry
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            state_capacity: 10_000,
            adjacency_capacity: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for storage
    pub data_dir: PathBuf,

    /// Workspace snapshot (JSON) loaded into the in-memory store at startup
    pub snapshot_file: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data_dir = directories::ProjectDirs::from("org", "lodestar", "lodestar")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));

        Self {
            data_dir,
            snapshot_file: None,
        }
    }
}

/// Machine learning configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MLConfig {
    /// Embedding model configuration
    pub embedding: EmbeddingConfig,
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Model type for embeddings
    pub model_type: EmbeddingModelType,

    /// Model name or path
    pub model_name: String,

    /// Local or remote embedding service
    pub service_type: EmbeddingServiceType,

    /// Remote service URL (if using remote)
    pub service_url: Option<String>,

    /// Bearer token for the remote service
    pub api_key: Option<String>,

    /// Vector dimensions
    pub dimensions: usize,

    /// HTTP timeout for remote calls
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model_type: EmbeddingModelType::Hashing,
            model_name: "feature-hashing".to_string(),
            service_type: EmbeddingServiceType::Local,
            service_url: None,
            api_key: None,
            dimensions: 256,
            request_timeout: Duration::from_secs(2),
        }
    }
}

/// Embedding model type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingModelType {
    /// Deterministic feature hashing (local only)
    Hashing,

    /// OpenAI compatible API
    OpenAI,

    /// Custom model/provider speaking the OpenAI wire format
    Custom,
}

/// Embedding service type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingServiceType {
    /// Local embedding service
    Local,

    /// Remote embedding service
    Remote,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,

    /// Log format
    pub format: LogFormat,

    /// File to log to (if any)
    pub file: Option<PathBuf>,

    /// Whether to log to stdout
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Default,
            file: None,
            stdout: true,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level
    Trace,

    /// Debug level
    Debug,

    /// Info level
    Info,

    /// Warn level
    Warn,

    /// Error level
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Default format
    Default,

    /// JSON format
    Json,

    /// Compact format
    Compact,

    /// Pretty format
    Pretty,
}
