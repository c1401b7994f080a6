//! Configuration system for Lodestar.
//!
//! Configuration is layered: built-in defaults, then an optional file (TOML, YAML or JSON),
//! then `LODESTAR_`-prefixed environment variables. Every layer is validated on extraction.

mod builder;
mod loader;
mod models;
#[cfg(test)]
mod tests;
pub mod validation;

pub use builder::ConfigBuilder;
pub use loader::ConfigLoader;
pub use models::*;

/// Default configuration file names that the system will look for
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "lodestar.toml",
    "lodestar.yaml",
    "lodestar.yml",
    "lodestar.json",
    ".lodestar/config.toml",
    ".lodestar/config.yaml",
    ".lodestar/config.yml",
    ".lodestar/config.json",
];

/// Environment variable prefix for Lodestar configuration
pub const ENV_PREFIX: &str = "LODESTAR_";

/// Configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Error occurred during file loading
    #[error("Failed to load configuration file: {0}")]
    FileLoadError(String),

    /// Error occurred during validation
    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    /// Error occurred during parsing
    #[error("Configuration parsing error: {0}")]
    ParseError(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
