//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the container engine and the
//! file service, allowing lifecycle tests without a real engine or disk.
//!
//! # Example
//!
//! ```rust,ignore
//! use gamehost_core::testing::{fixtures, MockEngine, MockFileService};
//!
//! let engine = Arc::new(MockEngine::new());
//! let files = Arc::new(MockFileService::new());
//! let store = fixtures::store_with_range(9000, 9100);
//!
//! // Build a ContainerRuntime and ServerOrchestrator from these...
//! ```

mod mock_engine;
mod mock_file_service;

pub use mock_engine::{EngineCall, EngineOperation, MockEngine};
pub use mock_file_service::MockFileService;

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::sync::Arc;

    use crate::config::ServerConfig;
    use crate::server::{CreateServerRequest, ServerStore, SqliteServerStore};

    /// Server config with the given container port range.
    pub fn server_config(min: u16, max: u16) -> ServerConfig {
        ServerConfig {
            min_container_port: min,
            max_container_port: max,
            external_address: "games.example.org".to_string(),
        }
    }

    /// In-memory store seeded with a server config.
    ///
    /// Panics if SQLite cannot be opened; only meant for tests.
    pub fn store_with_range(min: u16, max: u16) -> Arc<SqliteServerStore> {
        let store = Arc::new(SqliteServerStore::in_memory().unwrap());
        store.save_server_config(&server_config(min, max)).unwrap();
        store
    }

    /// Create request with cosmetic fields filled in.
    pub fn create_request(name: &str) -> CreateServerRequest {
        CreateServerRequest {
            name: name.to_string(),
            avatar_seed: format!("{}-seed", name),
            avatar_color: "#3366ff".to_string(),
        }
    }
}
