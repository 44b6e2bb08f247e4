//! Types for the server orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::files::FileError;
use crate::ports::PortError;
use crate::runtime::RuntimeError;
use crate::server::{InvalidTransition, ServerInstance, ServerStatus, StoreError};

/// Lifecycle operation, used in errors, logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Start,
    Stop,
    Delete,
    Refresh,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Start => "start",
            Operation::Stop => "stop",
            Operation::Delete => "delete",
            Operation::Refresh => "refresh",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse error class callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The server does not exist. Never retry.
    NotFound,
    /// Another operation holds the server. Retry later.
    Busy,
    /// No container port is free.
    CapacityExhausted,
    /// The container engine failed. The server is left in `ERROR`.
    RuntimeFailure,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Busy => "busy",
            ErrorCategory::CapacityExhausted => "capacity_exhausted",
            ErrorCategory::RuntimeFailure => "runtime_failure",
            ErrorCategory::Internal => "internal",
        }
    }
}

/// Errors that can occur during orchestration.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Server not found.
    #[error("server not found: {0}")]
    NotFound(Uuid),

    /// The server config row is missing.
    #[error("server configuration not found")]
    MissingConfig,

    /// Another operation holds the server, or it is mid-transition.
    #[error("server {id} is busy ({reason})")]
    Busy { id: Uuid, reason: BusyReason },

    /// The runtime failed during an operation.
    #[error("failed to {operation} server {id}: {source}")]
    Runtime {
        id: Uuid,
        operation: Operation,
        #[source]
        source: RuntimeError,
    },

    /// Server store error.
    #[error("server store error: {0}")]
    Store(#[from] StoreError),

    /// File service error.
    #[error("file service error: {0}")]
    Files(#[from] FileError),

    /// A status change the state machine forbids.
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Why a server was reported busy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusyReason {
    /// The lock was not freed in time.
    Locked,
    /// The server is in a transient status.
    Transitioning(ServerStatus),
}

impl fmt::Display for BusyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusyReason::Locked => f.write_str("locked by another operation"),
            BusyReason::Transitioning(status) => write!(f, "currently {}", status),
        }
    }
}

impl OrchestratorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrchestratorError::NotFound(_) | OrchestratorError::MissingConfig => {
                ErrorCategory::NotFound
            }
            OrchestratorError::Busy { .. } => ErrorCategory::Busy,
            OrchestratorError::Runtime {
                source: RuntimeError::Port(PortError::Exhausted { .. }),
                ..
            } => ErrorCategory::CapacityExhausted,
            OrchestratorError::Runtime {
                source: RuntimeError::Port(PortError::MissingConfig),
                ..
            } => ErrorCategory::NotFound,
            OrchestratorError::Runtime { .. } => ErrorCategory::RuntimeFailure,
            OrchestratorError::Store(_)
            | OrchestratorError::Files(_)
            | OrchestratorError::InvalidTransition(_) => ErrorCategory::Internal,
        }
    }

    /// Returns true if re-issuing the operation may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            OrchestratorError::NotFound(_)
            | OrchestratorError::MissingConfig
            | OrchestratorError::InvalidTransition(_) => false,
            OrchestratorError::Busy { .. } => true,
            OrchestratorError::Runtime { source, .. } => source.is_retryable(),
            OrchestratorError::Store(_) | OrchestratorError::Files(_) => true,
        }
    }
}

/// Result of a start or stop request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleOutcome {
    /// The server moved to the requested status.
    Transitioned(ServerInstance),
    /// The server already was in the requested status. Nothing was done.
    AlreadyInState(ServerInstance),
}

impl LifecycleOutcome {
    pub fn server(&self) -> &ServerInstance {
        match self {
            LifecycleOutcome::Transitioned(s) | LifecycleOutcome::AlreadyInState(s) => s,
        }
    }

    pub fn into_server(self) -> ServerInstance {
        match self {
            LifecycleOutcome::Transitioned(s) | LifecycleOutcome::AlreadyInState(s) => s,
        }
    }

    pub fn is_transitioned(&self) -> bool {
        matches!(self, LifecycleOutcome::Transitioned(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Transitioned(_) => "transitioned",
            LifecycleOutcome::AlreadyInState(_) => "already_in_state",
        }
    }
}

/// Result of a status refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Stored status matches the engine.
    Unchanged { status: ServerStatus },
    /// Stored status was corrected.
    Corrected { from: ServerStatus, to: ServerStatus },
    /// Not checked: the server is in `ERROR`, locked, or changed meanwhile.
    Skipped { status: ServerStatus },
}

/// Totals of one sweep over all servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub checked: usize,
    pub corrected: usize,
    pub skipped: usize,
    pub failed: usize,
}
