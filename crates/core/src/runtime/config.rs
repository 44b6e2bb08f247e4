//! Configuration for the container runtime.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the container engine and provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Path to the engine CLI binary.
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,

    /// Image tag game server containers are created from.
    #[serde(default = "default_image")]
    pub image: String,

    /// Absolute directory inside the container that receives files.
    #[serde(default = "default_mount_path")]
    pub mount_path: String,

    /// Timeout for a single engine command in seconds.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Backend domain handed to the game server as `BACKENDDOMAIN`.
    #[serde(default)]
    pub backend_domain: String,
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("docker")
}

fn default_image() -> String {
    "gameserver:latest".to_string()
}

fn default_mount_path() -> String {
    "/app/multiplayer".to_string()
}

fn default_command_timeout() -> u64 {
    300
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine_path: default_engine_path(),
            image: default_image(),
            mount_path: default_mount_path(),
            command_timeout_secs: default_command_timeout(),
            backend_domain: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Directory source archives are unpacked into.
    pub fn source_dir(&self) -> String {
        format!("{}/src/", self.mount_path.trim_end_matches('/'))
    }
}
