//! HTTP API error types.
//!
//! `ApiError` turns request and pipeline failures into JSON error responses
//! with a status code that tells the board whether retrying can help.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use fleet_agents::actions::ActionKind;
use fleet_agents::orchestrator::PipelineError;
use fleet_agents::request::RequestError;
use serde_json::json;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request was malformed or invalid. Nothing was changed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A collaborator or the worker slot failed while handling the request.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl ApiError {
    /// Map a failed action to a response, naming the action and epic for
    /// anything that is not the caller's fault.
    pub fn action_failed(action: ActionKind, epic_id: &str, err: PipelineError) -> Self {
        if err.is_client_error() {
            ApiError::BadRequest(err.to_string())
        } else {
            ApiError::InternalError(format!("Failed to execute {action} on {epic_id}: {err}"))
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// IntoResponse implementation
// ---------------------------------------------------------------------------

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
