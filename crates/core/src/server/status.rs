//! Server status state machine.
//!
//! ```text
//!   OFFLINE  --start-->  STARTING  --ok-->    ONLINE
//!   STARTING --fail-->   ERROR
//!   ONLINE   --stop-->   STOPPING  --ok-->    OFFLINE
//!   STOPPING --fail-->   ERROR
//!   ERROR    --start-->  STARTING
//!   ERROR    --stop-->   STOPPING
//! ```
//!
//! `ERROR` accepts both a new start and a new stop so a failed attempt can be
//! re-issued. Lifecycle transitions go through [`ServerStatus::can_transition_to`];
//! the periodic status sweep uses its own reconciliation path.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a game server instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    /// No container is running. Initial state.
    Offline,
    /// A start is in progress.
    Starting,
    /// The container is up and provisioned.
    Online,
    /// A stop is in progress.
    Stopping,
    /// The last start or stop attempt failed.
    Error,
}

/// How a lifecycle request relates to the current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request may proceed.
    Proceed,
    /// The instance is already where the request would take it.
    AlreadyInState,
    /// Another transition is in flight.
    Busy,
}

/// Attempted transition that is not an edge of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: ServerStatus,
    pub to: ServerStatus,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid status transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

impl ServerStatus {
    /// All statuses, in display order.
    pub const ALL: [ServerStatus; 5] = [
        ServerStatus::Offline,
        ServerStatus::Starting,
        ServerStatus::Online,
        ServerStatus::Stopping,
        ServerStatus::Error,
    ];

    /// Whether the state machine has an edge from `self` to `next`.
    pub fn can_transition_to(self, next: ServerStatus) -> bool {
        use ServerStatus::*;
        matches!(
            (self, next),
            (Offline, Starting)
                | (Error, Starting)
                | (Starting, Online)
                | (Starting, Error)
                | (Online, Stopping)
                | (Error, Stopping)
                | (Stopping, Offline)
                | (Stopping, Error)
        )
    }

    /// Decide whether a start request may proceed from this status.
    pub fn admit_start(self) -> Admission {
        match self {
            ServerStatus::Offline | ServerStatus::Error => Admission::Proceed,
            ServerStatus::Online => Admission::AlreadyInState,
            ServerStatus::Starting | ServerStatus::Stopping => Admission::Busy,
        }
    }

    /// Decide whether a stop request may proceed from this status.
    pub fn admit_stop(self) -> Admission {
        match self {
            ServerStatus::Online | ServerStatus::Error => Admission::Proceed,
            ServerStatus::Offline => Admission::AlreadyInState,
            ServerStatus::Starting | ServerStatus::Stopping => Admission::Busy,
        }
    }

    /// Returns true while a start or stop is in flight.
    pub fn is_transient(self) -> bool {
        matches!(self, ServerStatus::Starting | ServerStatus::Stopping)
    }

    /// Returns the status as stored and rendered.
    pub fn as_str(self) -> &'static str {
        match self {
            ServerStatus::Offline => "OFFLINE",
            ServerStatus::Starting => "STARTING",
            ServerStatus::Online => "ONLINE",
            ServerStatus::Stopping => "STOPPING",
            ServerStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServerStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown server status: {}", s))
    }
}
