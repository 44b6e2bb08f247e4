//! Error types for the runtime module.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::ports::PortError;

/// Errors reported by a container engine command.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Engine binary not found.
    #[error("Container engine not found at path: {path}")]
    BinaryNotFound { path: PathBuf },

    /// The container does not exist.
    #[error("No such container: {container}")]
    NotFound { container: String },

    /// The host port is already bound.
    #[error("Port already in use: {detail}")]
    PortInUse { detail: String },

    /// The command exited unsuccessfully.
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The command did not finish in time and was killed.
    #[error("Engine command timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// I/O error while running the command.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn command_failed(
        command: impl Into<String>,
        code: Option<i32>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
            stderr: stderr.into(),
        }
    }

    /// Whether the container was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if re-issuing the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::BinaryNotFound { .. })
    }
}

/// Step of a runtime operation, reported with failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateContainer,
    CreateMountDir,
    CopyFile,
    UnpackArchive,
    StopContainer,
    RemoveContainer,
    InspectContainer,
}

impl ProvisionStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProvisionStep::CreateContainer => "create container",
            ProvisionStep::CreateMountDir => "create mount directory",
            ProvisionStep::CopyFile => "copy file",
            ProvisionStep::UnpackArchive => "unpack archive",
            ProvisionStep::StopContainer => "stop container",
            ProvisionStep::RemoveContainer => "remove container",
            ProvisionStep::InspectContainer => "inspect container",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a runtime operation.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No port could be allocated. No container was created.
    #[error("Port allocation failed: {0}")]
    Port(#[from] PortError),

    /// An engine step failed.
    #[error("Failed to {step}{}: {source}", container_suffix(.container))]
    Step {
        step: ProvisionStep,
        /// Set from the create step on, so callers can clean it up. The
        /// engine may or may not have created it when `run` itself failed.
        container: Option<String>,
        /// Port reserved for the container.
        port: Option<u16>,
        #[source]
        source: EngineError,
    },
}

fn container_suffix(container: &Option<String>) -> String {
    container
        .as_ref()
        .map(|c| format!(" ({})", c))
        .unwrap_or_default()
}

impl RuntimeError {
    pub fn step(step: ProvisionStep, container: Option<String>, source: EngineError) -> Self {
        Self::Step {
            step,
            container,
            port: None,
            source,
        }
    }

    /// Whether the failure means the container was already absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Step { source, .. } if source.is_not_found())
    }

    /// Name of the container left behind by a failed start, if any.
    pub fn container(&self) -> Option<&str> {
        match self {
            Self::Step { container, .. } => container.as_deref(),
            Self::Port(_) => None,
        }
    }

    /// Port of the container left behind by a failed start, if any.
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Step { port, .. } => *port,
            Self::Port(_) => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Port(PortError::Exhausted { .. }) => true,
            Self::Port(_) => false,
            Self::Step { source, .. } => source.is_retryable(),
        }
    }
}
