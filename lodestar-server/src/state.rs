//! Application state management

use lodestar::core::RetrievalEngine;

use crate::config::ServerConfig;

/// Application state shared across all handlers
#[derive(Debug)]
pub struct AppState {
    pub engine: RetrievalEngine,

    pub config: ServerConfig,
}

impl AppState {
    pub fn new(engine: RetrievalEngine, config: ServerConfig) -> Self {
        Self { engine, config }
    }
}
