use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use lodestar_server::cli::CliArgs;
use lodestar_server::config::ServerConfig;
use lodestar_server::{AppState, create_app};

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    // The server owns the global subscriber; the engine's own logging init then becomes a no-op
    let filter = match &cli_args.log_level {
        Some(level) => tracing_subscriber::EnvFilter::new(level),
        None => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting Lodestar server v{}", lodestar::VERSION);

    let server_config = ServerConfig::from_cli_and_env(cli_args)?;
    let engine_config = server_config
        .engine_config()
        .context("Failed to load engine configuration")?;
    if let Some(path) = &engine_config.storage.snapshot_file {
        info!(path = %path.display(), "Loading workspace snapshot");
    }

    let engine = lodestar::init(engine_config).await?;
    info!("Retrieval engine initialized");

    let app_state = Arc::new(AppState::new(engine, server_config.clone()));

    let app = create_app(app_state);

    let addr: SocketAddr = format!("{}:{}", server_config.host, server_config.port)
        .parse()
        .context("Invalid bind address")?;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
