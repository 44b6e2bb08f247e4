//! Server lifecycle API handlers.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use gamehost_core::{
    CreateServerRequest, FileType, LifecycleOutcome, ProvisionedFile, RefreshOutcome,
    ServerInstance, ServerStatus,
};

use super::error::ApiError;
use crate::state::AppState;

/// Upper bound for a single uploaded file.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating a server
#[derive(Debug, Deserialize)]
pub struct CreateServerBody {
    pub name: String,
    #[serde(default)]
    pub avatar_seed: String,
    #[serde(default)]
    pub avatar_color: String,
}

/// Server as exposed over the API. Never carries the room password.
#[derive(Debug, Serialize)]
pub struct ServerResponse {
    pub id: Uuid,
    pub name: String,
    pub avatar_seed: String,
    pub avatar_color: String,
    pub container_address: String,
    pub container_port: Option<u16>,
    pub status: ServerStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub stop_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ServerInstance> for ServerResponse {
    fn from(server: ServerInstance) -> Self {
        Self {
            id: server.id,
            name: server.name,
            avatar_seed: server.avatar_seed,
            avatar_color: server.avatar_color,
            container_address: server.container_address,
            container_port: server.container_port,
            status: server.status,
            start_time: server.start_time,
            stop_time: server.stop_time,
            created_at: server.created_at,
        }
    }
}

/// Response for create: the only place the room password is returned.
#[derive(Debug, Serialize)]
pub struct CreateServerResponse {
    #[serde(flatten)]
    pub server: ServerResponse,
    pub room_password: String,
}

#[derive(Debug, Serialize)]
pub struct ListServersResponse {
    pub servers: Vec<ServerResponse>,
    pub total: usize,
}

/// Response for start and stop
#[derive(Debug, Serialize)]
pub struct LifecycleResponse {
    /// `transitioned` or `already_in_state`
    pub outcome: String,
    pub server: ServerResponse,
}

impl From<LifecycleOutcome> for LifecycleResponse {
    fn from(outcome: LifecycleOutcome) -> Self {
        Self {
            outcome: outcome.as_str().to_string(),
            server: outcome.into_server().into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: Uuid,
    pub file_type: FileType,
    pub name: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

impl From<ProvisionedFile> for FileResponse {
    fn from(file: ProvisionedFile) -> Self {
        Self {
            id: file.id,
            file_type: file.file_type,
            name: file.name,
            size_bytes: file.size_bytes,
            created_at: file.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AccessBody {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub valid: bool,
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::bad_request(format!("invalid server id: {}", raw)))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/servers
pub async fn create_server(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateServerBody>,
) -> Result<(StatusCode, Json<CreateServerResponse>), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(ApiError::bad_request("name must not be empty"));
    }

    let server = state.orchestrator().create(CreateServerRequest {
        name: name.to_string(),
        avatar_seed: body.avatar_seed,
        avatar_color: body.avatar_color,
    })?;

    let room_password = server.room_password.clone();
    Ok((
        StatusCode::CREATED,
        Json(CreateServerResponse {
            server: server.into(),
            room_password,
        }),
    ))
}

/// GET /api/v1/servers
pub async fn list_servers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ListServersResponse>, ApiError> {
    let servers: Vec<ServerResponse> = state
        .orchestrator()
        .list()?
        .into_iter()
        .map(ServerResponse::from)
        .collect();

    Ok(Json(ListServersResponse {
        total: servers.len(),
        servers,
    }))
}

/// GET /api/v1/servers/{id}
pub async fn get_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ServerResponse>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.orchestrator().get(id)?.into()))
}

/// DELETE /api/v1/servers/{id}
pub async fn delete_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    state.orchestrator().delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/servers/{id}/start
pub async fn start_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = state.orchestrator().start(id).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/servers/{id}/stop
pub async fn stop_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = state.orchestrator().stop(id).await?;
    Ok(Json(outcome.into()))
}

/// POST /api/v1/servers/{id}/refresh
///
/// Reconcile the stored status with the engine.
pub async fn refresh_server(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RefreshOutcome>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.orchestrator().refresh_status(id).await?))
}

/// GET /api/v1/servers/{id}/files
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FileResponse>>, ApiError> {
    let id = parse_id(&id)?;
    let files = state.orchestrator().files(id).await?;
    Ok(Json(files.into_iter().map(FileResponse::from).collect()))
}

/// POST /api/v1/servers/{id}/files/{file_type}
///
/// Multipart upload. The `file` field carries the content; an optional `name`
/// field overrides the uploaded file name.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Path((id, file_type)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileResponse>), ApiError> {
    let id = parse_id(&id)?;
    let file_type: FileType = file_type.parse().map_err(ApiError::bad_request)?;

    let mut data: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut name_override: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                return Err(ApiError::bad_request(format!(
                    "Invalid multipart body: {}",
                    e
                )))
            }
        };

        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                file_name = field.file_name().map(|s| s.to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                data = Some(bytes.to_vec());
            }
            "name" => {
                if let Ok(text) = field.text().await {
                    if !text.trim().is_empty() {
                        name_override = Some(text.trim().to_string());
                    }
                }
            }
            _ => {}
        }
    }

    let data = data.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let name = name_override
        .or(file_name)
        .ok_or_else(|| ApiError::bad_request("No file name provided"))?;

    let file = state
        .orchestrator()
        .add_file(id, file_type, &name, &data)
        .await?;
    Ok((StatusCode::CREATED, Json(file.into())))
}

/// POST /api/v1/servers/{id}/access
pub async fn validate_access(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AccessBody>,
) -> Result<Json<AccessResponse>, ApiError> {
    let id = parse_id(&id)?;
    let valid = state.orchestrator().validate_access(id, &body.password)?;
    Ok(Json(AccessResponse { valid }))
}
