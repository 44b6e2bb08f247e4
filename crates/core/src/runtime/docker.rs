//! Docker CLI engine implementation.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::RuntimeConfig;
use super::engine::{ContainerEngine, RunRequest};
use super::error::EngineError;

/// Drives containers through the `docker` command line.
pub struct DockerCliEngine {
    config: RuntimeConfig,
}

impl DockerCliEngine {
    /// Creates a new engine with the given configuration.
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RuntimeConfig::default())
    }

    fn build_run_args(request: &RunRequest) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            request.container_name.clone(),
            "-p".to_string(),
            format!("{port}:{port}/udp", port = request.port),
        ];
        for (key, value) in &request.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(request.image.clone());
        args
    }

    fn build_mkdir_args(container: &str, dir: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            container.to_string(),
            "mkdir".to_string(),
            "-p".to_string(),
            dir.to_string(),
        ]
    }

    fn build_copy_args(container: &str, source: &Path, dir: &str) -> Vec<String> {
        vec![
            "cp".to_string(),
            source.to_string_lossy().into_owned(),
            format!("{}:{}/", container, dir.trim_end_matches('/')),
        ]
    }

    fn build_unpack_args(container: &str, archive: &str, dest: &str) -> Vec<String> {
        vec![
            "exec".to_string(),
            container.to_string(),
            "unzip".to_string(),
            "-o".to_string(),
            archive.to_string(),
            "-d".to_string(),
            dest.to_string(),
        ]
    }

    fn build_inspect_args(container: &str) -> Vec<String> {
        vec![
            "inspect".to_string(),
            "--format".to_string(),
            "{{.State.Running}}".to_string(),
            container.to_string(),
        ]
    }

    /// Maps a failed command to an error using its stderr.
    fn classify_failure(
        args: &[String],
        code: Option<i32>,
        stderr: &str,
        container: Option<&str>,
    ) -> EngineError {
        let lower = stderr.to_ascii_lowercase();
        if lower.contains("no such container") || lower.contains("no such object") {
            return EngineError::NotFound {
                container: container.unwrap_or_default().to_string(),
            };
        }
        if lower.contains("port is already allocated")
            || lower.contains("address already in use")
        {
            return EngineError::PortInUse {
                detail: stderr.trim().to_string(),
            };
        }
        let command = format!(
            "docker {}",
            args.first().map(String::as_str).unwrap_or_default()
        );
        EngineError::command_failed(command, code, stderr.trim())
    }

    /// Runs one engine command and returns its stdout.
    async fn run_command(
        &self,
        args: Vec<String>,
        container: Option<&str>,
    ) -> Result<String, EngineError> {
        debug!(engine = %self.config.engine_path.display(), ?args, "running engine command");

        let child = Command::new(&self.config.engine_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::BinaryNotFound {
                        path: self.config.engine_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        // A timed-out child is dropped here and killed.
        let timeout_duration = Duration::from_secs(self.config.command_timeout_secs);
        let output = match timeout(timeout_duration, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.command_timeout_secs,
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::classify_failure(
                &args,
                output.status.code(),
                &stderr,
                container,
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ContainerEngine for DockerCliEngine {
    fn name(&self) -> &str {
        "docker"
    }

    async fn run(&self, request: &RunRequest) -> Result<(), EngineError> {
        self.run_command(Self::build_run_args(request), Some(&request.container_name))
            .await
            .map(|_| ())
    }

    async fn make_dir(&self, container: &str, dir: &str) -> Result<(), EngineError> {
        self.run_command(Self::build_mkdir_args(container, dir), Some(container))
            .await
            .map(|_| ())
    }

    async fn copy_into(
        &self,
        container: &str,
        source: &Path,
        dir: &str,
    ) -> Result<(), EngineError> {
        self.run_command(Self::build_copy_args(container, source, dir), Some(container))
            .await
            .map(|_| ())
    }

    async fn unpack(&self, container: &str, archive: &str, dest: &str) -> Result<(), EngineError> {
        let args = Self::build_unpack_args(container, archive, dest);
        self.run_command(args, Some(container))
            .await
            .map(|_| ())
    }

    async fn stop(&self, container: &str) -> Result<(), EngineError> {
        self.run_command(vec!["stop".to_string(), container.to_string()], Some(container))
            .await
            .map(|_| ())
    }

    async fn remove(&self, container: &str) -> Result<(), EngineError> {
        self.run_command(vec!["rm".to_string(), container.to_string()], Some(container))
            .await
            .map(|_| ())
    }

    async fn is_running(&self, container: &str) -> Result<bool, EngineError> {
        let args = Self::build_inspect_args(container);
        match self.run_command(args, Some(container)).await {
            Ok(stdout) => Ok(stdout.trim() == "true"),
            Err(EngineError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn validate(&self) -> Result<(), EngineError> {
        self.run_command(vec!["version".to_string()], None).await.map(|_| ())
    }
}
