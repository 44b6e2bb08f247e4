//! Server orchestrator.
//!
//! Serializes lifecycle operations per server and drives each server through
//! the status machine:
//! - **Start/Stop/Delete**: hold the server lock for the whole operation
//! - **Refresh**: reads without the lock, corrects only if the lock is free
//! - **Sweep**: refreshes every server on an interval

mod access;
mod config;
mod service;
mod sweeper;
mod types;

pub use access::{generate_password, password_matches, PASSWORD_CHARSET};
pub use config::OrchestratorConfig;
pub use service::ServerOrchestrator;
pub use sweeper::StatusSweeper;
pub use types::{
    BusyReason, ErrorCategory, LifecycleOutcome, Operation, OrchestratorError, RefreshOutcome,
    SweepReport,
};
