use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - HTTP port is not 0
/// - Container port range is non-empty, ordered and wider than the allocator's retry bound
/// - Timeouts and retry bounds are non-zero
/// - Runtime image and mount path are set
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.http.port == 0 {
        return Err(ConfigError::ValidationError(
            "http.port cannot be 0".to_string(),
        ));
    }

    let servers = &config.servers;
    if servers.min_container_port == 0 {
        return Err(ConfigError::ValidationError(
            "servers.min_container_port cannot be 0".to_string(),
        ));
    }
    if servers.min_container_port >= servers.max_container_port {
        return Err(ConfigError::ValidationError(format!(
            "servers.min_container_port ({}) must be lower than servers.max_container_port ({})",
            servers.min_container_port, servers.max_container_port
        )));
    }
    if servers.external_address.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "servers.external_address cannot be empty".to_string(),
        ));
    }

    let orchestrator = &config.orchestrator;
    if orchestrator.port_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.port_attempts cannot be 0".to_string(),
        ));
    }
    if servers.port_count() < orchestrator.port_attempts {
        return Err(ConfigError::ValidationError(format!(
            "container port range holds {} ports, need at least orchestrator.port_attempts ({})",
            servers.port_count(),
            orchestrator.port_attempts
        )));
    }
    if orchestrator.lock_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.lock_timeout_secs cannot be 0".to_string(),
        ));
    }
    if orchestrator.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.sweep_interval_secs cannot be 0".to_string(),
        ));
    }
    if orchestrator.password_length == 0 {
        return Err(ConfigError::ValidationError(
            "orchestrator.password_length cannot be 0".to_string(),
        ));
    }

    let runtime = &config.runtime;
    if runtime.command_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "runtime.command_timeout_secs cannot be 0".to_string(),
        ));
    }
    if runtime.image.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "runtime.image cannot be empty".to_string(),
        ));
    }
    if !runtime.mount_path.starts_with('/') {
        return Err(ConfigError::ValidationError(format!(
            "runtime.mount_path must be absolute, got {:?}",
            runtime.mount_path
        )));
    }

    Ok(())
}
