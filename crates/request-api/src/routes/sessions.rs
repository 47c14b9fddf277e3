//! Session management handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use database::{Session, SessionStatus};
use session_manager::SessionUpdate;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct FindOrCreateBody {
    pub user_id: String,
    pub integration_type: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
    #[serde(default)]
    pub current_agent_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Present-but-null clears the runtime handle.
    #[serde(default, deserialize_with = "double_option")]
    pub runtime_session_id: Option<Option<String>>,
    #[serde(default)]
    pub integration_metadata: Option<Value>,
}

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D>(de: D) -> std::result::Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Some(Option::deserialize(de)?))
}

fn session_json(session: &Session) -> Value {
    serde_json::json!({
        "session_id": session.session_id,
        "user_id": session.user_id,
        "integration_type": session.integration_type,
        "channel_id": session.channel_id,
        "thread_id": session.thread_id,
        "current_agent_id": session.current_agent_id,
        "runtime_session_id": session.runtime_session_id,
        "status": session.status,
        "total_requests": session.total_requests,
        "created_at": session.created_at,
        "updated_at": session.updated_at,
        "last_request_at": session.last_request_at,
    })
}

/// `POST /api/v1/sessions` — find the active session for a channel tuple,
/// creating one if needed.
pub async fn find_or_create(
    State(state): State<AppState>,
    Json(body): Json<FindOrCreateBody>,
) -> Result<(StatusCode, Json<Value>)> {
    if body.user_id.trim().is_empty() || body.integration_type.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "user_id and integration_type are required".to_string(),
        ));
    }

    let session = state
        .sessions
        .find_or_create_session(
            &body.user_id,
            &body.integration_type,
            body.channel_id.as_deref(),
            body.thread_id.as_deref(),
        )
        .await?;

    Ok((StatusCode::OK, Json(session_json(&session))))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub user_id: String,
}

/// `GET /api/v1/sessions?user_id=...` — a user's sessions, most recent first.
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Value>> {
    let sessions = state.sessions.list_sessions(&params.user_id).await?;
    let sessions: Vec<Value> = sessions.iter().map(session_json).collect();

    Ok(Json(serde_json::json!({
        "user_id": params.user_id,
        "sessions": sessions,
    })))
}

/// `GET /api/v1/sessions/:id`
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>> {
    let session = state.sessions.get_session(&session_id).await?;
    Ok(Json(session_json(&session)))
}

/// `PUT /api/v1/sessions/:id` — partial update; only supplied fields change.
pub async fn update_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<UpdateBody>,
) -> Result<Json<Value>> {
    let status = match body.status.as_deref() {
        None => None,
        Some("ACTIVE") => Some(SessionStatus::Active),
        Some("INACTIVE") => Some(SessionStatus::Inactive),
        Some(other) => {
            return Err(ApiError::BadRequest(format!(
                "unknown session status: {other}"
            )))
        }
    };

    let update = SessionUpdate {
        current_agent_id: body.current_agent_id,
        status,
        runtime_session_id: body.runtime_session_id,
        integration_metadata: body.integration_metadata.map(|v| v.to_string()),
    };

    let session = state.sessions.update_session(&session_id, update).await?;
    Ok(Json(session_json(&session)))
}

/// `POST /api/v1/sessions/:id/reset` — clear the agent assignment and
/// runtime handle so the next request starts fresh at the router.
pub async fn reset_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<Value>> {
    let session = state.sessions.reset_session(&session_id).await?;
    Ok(Json(session_json(&session)))
}
