//! Server storage trait and error type.

use std::fmt;

use uuid::Uuid;

use super::ServerInstance;
use crate::config::ServerConfig;

/// Error type for server store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Database error.
    Database(String),
    /// A stored row could not be decoded.
    Corrupt { id: String, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(msg) => write!(f, "Database error: {}", msg),
            StoreError::Corrupt { id, reason } => {
                write!(f, "Corrupt server record {}: {}", id, reason)
            }
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Trait for server storage backends.
///
/// Holds the server records and the single [`ServerConfig`] row.
pub trait ServerStore: Send + Sync {
    /// Get a server by ID.
    fn get(&self, id: &Uuid) -> Result<Option<ServerInstance>, StoreError>;

    /// List all servers, oldest first.
    fn list(&self) -> Result<Vec<ServerInstance>, StoreError>;

    /// Insert or replace a server record.
    fn save(&self, server: &ServerInstance) -> Result<(), StoreError>;

    /// Delete a server. Returns false if it did not exist.
    fn delete(&self, id: &Uuid) -> Result<bool, StoreError>;

    /// Find the server currently holding `port`, if any.
    fn find_by_container_port(&self, port: u16) -> Result<Option<ServerInstance>, StoreError>;

    /// Read the config row.
    fn server_config(&self) -> Result<Option<ServerConfig>, StoreError>;

    /// Write the config row.
    fn save_server_config(&self, config: &ServerConfig) -> Result<(), StoreError>;
}
