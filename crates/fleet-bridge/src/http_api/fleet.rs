use axum::{body::Bytes, extract::State, response::IntoResponse, Json};
use fleet_agents::request::ActionRequest;
use serde_json::json;
use std::sync::Arc;

use super::state::ApiState;
use crate::api_error::ApiError;

/// GET /api/health -- liveness probe.
pub(crate) async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// POST /api/fleet/action -- run one pipeline action against an epic.
///
/// Body: `{ epicId, epicTitle, action, feedback?, currentLabels? }`.
///
/// # Response
/// * `200 OK` - `{ success, action, epicId, session? }`, plus `stopped`/`pid`
///   for `stop-agent`
/// * `400 Bad Request` - malformed body, missing field or unknown action
/// * `500 Internal Server Error` - `Failed to execute <action> on <epicId>: ...`
pub(crate) async fn execute_action(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req = ActionRequest::from_json(&body)?;
    let (action, epic_id) = (req.action, req.epic_id.clone());

    match state.orchestrator.execute(req).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => {
            tracing::error!(%epic_id, %action, error = %e, "pipeline action failed");
            Err(ApiError::action_failed(action, &epic_id, e))
        }
    }
}

/// GET /api/fleet/status -- whether an agent is running, with its log tail.
pub(crate) async fn agent_status(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    Json(state.orchestrator.agents().status().await)
}
