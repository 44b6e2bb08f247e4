//! Container engine abstraction.

use async_trait::async_trait;
use std::path::Path;

use super::error::EngineError;

/// Parameters for creating and launching a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunRequest {
    pub container_name: String,
    pub image: String,
    /// Published as `<port>:<port>/udp`.
    pub port: u16,
    pub env: Vec<(String, String)>,
}

/// Primitive operations of a container engine.
///
/// Implementations report a missing container as [`EngineError::NotFound`]
/// and a host port conflict as [`EngineError::PortInUse`].
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Create and start a detached container.
    async fn run(&self, request: &RunRequest) -> Result<(), EngineError>;

    /// Create a directory (with parents) inside a running container.
    async fn make_dir(&self, container: &str, dir: &str) -> Result<(), EngineError>;

    /// Copy a host file into `dir` inside the container.
    async fn copy_into(&self, container: &str, source: &Path, dir: &str)
        -> Result<(), EngineError>;

    /// Unpack a zip archive that is already inside the container.
    async fn unpack(&self, container: &str, archive: &str, dest: &str)
        -> Result<(), EngineError>;

    /// Stop a container.
    async fn stop(&self, container: &str) -> Result<(), EngineError>;

    /// Remove a stopped container.
    async fn remove(&self, container: &str) -> Result<(), EngineError>;

    /// Whether the container exists and is running.
    async fn is_running(&self, container: &str) -> Result<bool, EngineError>;

    /// Validates that the engine is reachable.
    async fn validate(&self) -> Result<(), EngineError>;
}
