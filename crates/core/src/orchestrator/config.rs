//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::ports::DEFAULT_PORT_ATTEMPTS;

/// Configuration for the server orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// How long a lifecycle operation waits for the server lock (seconds).
    #[serde(default = "default_lock_timeout")]
    pub lock_timeout_secs: u64,

    /// Enable/disable the background status sweep.
    #[serde(default = "default_true")]
    pub sweep_enabled: bool,

    /// How often the sweep refreshes every server (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Length of generated room passwords.
    #[serde(default = "default_password_length")]
    pub password_length: usize,

    /// Random candidates drawn before port allocation gives up.
    #[serde(default = "default_port_attempts")]
    pub port_attempts: u32,
}

fn default_lock_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_password_length() -> usize {
    24
}

fn default_port_attempts() -> u32 {
    DEFAULT_PORT_ATTEMPTS
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            lock_timeout_secs: default_lock_timeout(),
            sweep_enabled: true,
            sweep_interval_secs: default_sweep_interval(),
            password_length: default_password_length(),
            port_attempts: default_port_attempts(),
        }
    }
}
