//! Game server instance record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{InvalidTransition, ServerStatus};

/// A managed game server and the container backing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerInstance {
    pub id: Uuid,
    pub name: String,
    /// Room password handed to players. Generated on creation.
    pub room_password: String,
    /// Cosmetic, opaque to the orchestrator.
    pub avatar_seed: String,
    /// Cosmetic, opaque to the orchestrator.
    pub avatar_color: String,
    /// Host players connect to.
    pub container_address: String,
    /// Published UDP port while a container exists.
    pub container_port: Option<u16>,
    /// Engine-side container name while a container exists.
    pub container_name: Option<String>,
    pub status: ServerStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new server instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateServerRequest {
    pub name: String,
    #[serde(default)]
    pub avatar_seed: String,
    #[serde(default)]
    pub avatar_color: String,
}

impl ServerInstance {
    /// Builds a fresh, offline instance.
    pub fn new(
        request: CreateServerRequest,
        room_password: String,
        container_address: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: request.name,
            room_password,
            avatar_seed: request.avatar_seed,
            avatar_color: request.avatar_color,
            container_address,
            container_port: None,
            container_name: None,
            status: ServerStatus::Offline,
            start_time: None,
            stop_time: None,
            created_at: Utc::now(),
        }
    }

    /// Moves to `next` if the state machine allows it.
    pub fn transition_to(&mut self, next: ServerStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Records a running container. Clears the stop time.
    pub fn mark_started(&mut self, container_name: String, port: u16, at: DateTime<Utc>) {
        self.container_name = Some(container_name);
        self.container_port = Some(port);
        self.start_time = Some(at);
        self.stop_time = None;
    }

    /// Forgets the container. Clears the start time.
    pub fn mark_stopped(&mut self, at: DateTime<Utc>) {
        self.container_name = None;
        self.container_port = None;
        self.start_time = None;
        self.stop_time = Some(at);
    }

    /// Whether a container is recorded for this instance.
    pub fn has_container(&self) -> bool {
        self.container_name.is_some()
    }
}
