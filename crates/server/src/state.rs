use std::sync::Arc;

use gamehost_core::{Config, ServerOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<ServerOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<ServerOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn orchestrator(&self) -> &Arc<ServerOrchestrator> {
        &self.orchestrator
    }
}
