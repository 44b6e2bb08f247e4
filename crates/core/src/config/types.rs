use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

use crate::files::FilesConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::runtime::RuntimeConfig;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub servers: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub files: FilesConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("gamehost.db")
}

/// Settings shared by every game server container.
///
/// Loaded from the `[servers]` section at startup and written to the store's
/// single config row, which is what the port allocator reads afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Lowest container port that may be assigned (inclusive).
    pub min_container_port: u16,
    /// Highest container port that may be assigned (inclusive).
    pub max_container_port: u16,
    /// Host or domain under which containers are reachable from outside.
    pub external_address: String,
}

impl ServerConfig {
    /// Number of ports in the configured range.
    pub fn port_count(&self) -> u32 {
        if self.max_container_port < self.min_container_port {
            return 0;
        }
        u32::from(self.max_container_port) - u32::from(self.min_container_port) + 1
    }

    /// Whether `port` lies inside the configured range.
    pub fn contains(&self, port: u16) -> bool {
        (self.min_container_port..=self.max_container_port).contains(&port)
    }
}
