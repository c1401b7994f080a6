//! Server configuration module

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Maximum request body size in bytes
    pub max_request_size: usize,

    /// Engine configuration file; default locations are searched when unset
    pub config_file: Option<PathBuf>,

    /// Workspace snapshot loaded at startup; overrides the engine configuration
    pub snapshot_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            max_request_size: 2 * 1024 * 1024,
            config_file: None,
            snapshot_file: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from CLI arguments and environment variables
    /// CLI arguments take precedence over environment variables
    pub fn from_cli_and_env(cli_args: crate::cli::CliArgs) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = cli_args.host {
            config.host = host;
        } else if let Ok(host) = env::var("LODESTAR_HOST") {
            config.host = host;
        }

        if let Some(port) = cli_args.port {
            config.port = port;
        } else if let Ok(port) = env::var("LODESTAR_PORT") {
            config.port = port.parse()?;
        }

        if let Some(max_size) = cli_args.max_request_size {
            config.max_request_size = max_size;
        } else if let Ok(max_size) = env::var("LODESTAR_MAX_REQUEST_SIZE") {
            config.max_request_size = max_size.parse()?;
        }

        if let Some(path) = cli_args.config_file {
            config.config_file = Some(path);
        } else if let Ok(path) = env::var("LODESTAR_CONFIG_FILE") {
            config.config_file = Some(PathBuf::from(path));
        }

        if let Some(path) = cli_args.snapshot_file {
            config.snapshot_file = Some(path);
        } else if let Ok(path) = env::var("LODESTAR_SNAPSHOT_FILE") {
            config.snapshot_file = Some(PathBuf::from(path));
        }

        Ok(config)
    }

    /// Engine configuration: the configured (or default) file, the environment, then the
    /// snapshot override
    pub fn engine_config(&self) -> Result<lodestar::config::LodestarConfig> {
        let mut loader = lodestar::config::ConfigLoader::new();
        match &self.config_file {
            Some(path) => {
                loader.load_file(path)?;
            }
            None => {
                loader.load_default_files();
            }
        }
        let mut engine = loader.load_env().extract()?;
        if let Some(path) = &self.snapshot_file {
            engine.storage.snapshot_file = Some(path.clone());
        }
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::CliArgs;
    use std::io::Write;

    #[test]
    fn test_cli_overrides_defaults() {
        let args = CliArgs {
            port: Some(8080),
            snapshot_file: Some(PathBuf::from("/tmp/ws.json")),
            ..Default::default()
        };
        let config = ServerConfig::from_cli_and_env(args).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.snapshot_file, Some(PathBuf::from("/tmp/ws.json")));
    }

    #[test]
    fn test_snapshot_override_reaches_engine_config() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[retrieval]
default_limit = 7

[storage]
snapshot_file = "/tmp/from-file.json"
"#
        )
        .unwrap();

        let config = ServerConfig {
            config_file: Some(file.path().to_path_buf()),
            snapshot_file: Some(PathBuf::from("/tmp/from-cli.json")),
            ..Default::default()
        };
        let engine = config.engine_config().unwrap();
        assert_eq!(engine.retrieval.default_limit, 7);
        assert_eq!(
            engine.storage.snapshot_file,
            Some(PathBuf::from("/tmp/from-cli.json"))
        );
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let config = ServerConfig {
            config_file: Some(PathBuf::from("/definitely/not/here.toml")),
            ..Default::default()
        };
        assert!(config.engine_config().is_err());
    }
}
