//! Error responses for the API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use gamehost_core::{ErrorCategory, FileError, OrchestratorError};

/// Error body: `{"error": <category>, "detail": <message>}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

/// An error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorResponse {
                error: "bad_request".to_string(),
                detail: detail.into(),
            },
        }
    }
}

/// HTTP status for an error category.
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Busy => StatusCode::CONFLICT,
        ErrorCategory::CapacityExhausted => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCategory::RuntimeFailure => StatusCode::BAD_GATEWAY,
        ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        // Rejected file names are caller input, not a server fault.
        if let OrchestratorError::Files(FileError::InvalidName { .. }) = &err {
            return ApiError::bad_request(err.to_string());
        }

        let category = err.category();
        let status = status_for(category);
        if status.is_server_error() {
            tracing::error!(category = category.as_str(), "Request failed: {}", err);
        }

        Self {
            status,
            body: ErrorResponse {
                error: category.as_str().to_string(),
                detail: err.to_string(),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
