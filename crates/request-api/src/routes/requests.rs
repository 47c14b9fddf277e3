//! Channel ingress and request status handlers.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use database::request_log;
use events::{IngressChannel, RequestType};
use orchestrator::{IncomingRequest, ProcessingMode, ProcessingOutcome};

use crate::error::{ApiError, Result};
use crate::state::AppState;

/// Wire shape shared by all channel ingress routes.
#[derive(Debug, Deserialize)]
pub struct SubmitBody {
    pub content: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub target_agent_id: Option<String>,
    #[serde(default)]
    pub integration_context: Value,
    #[serde(default)]
    pub user_context: Value,
}

#[derive(Debug, Deserialize)]
pub struct SyncParams {
    /// Maximum wait in seconds before answering with a timeout.
    pub timeout: Option<u64>,
}

/// Resolved identity from the authentication collaborator upstream.
fn resolved_user(headers: &HeaderMap) -> Result<String> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest("missing resolved user identity".to_string()))
}

fn incoming(channel: &str, user_id: String, body: SubmitBody) -> Result<IncomingRequest> {
    let channel = IngressChannel::parse(channel)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown channel: {channel}")))?;

    Ok(IncomingRequest {
        channel,
        user_id,
        content: body.content,
        channel_id: body.channel_id,
        thread_id: body.thread_id,
        request_type: if body.target_agent_id.is_some() {
            RequestType::RoutedRequest
        } else {
            RequestType::Message
        },
        target_agent_id: body.target_agent_id,
        integration_context: body.integration_context,
        user_context: body.user_context,
    })
}

/// `POST /api/v1/requests/:channel` — accept and resolve asynchronously.
pub async fn submit(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<Value>)> {
    let user_id = resolved_user(&headers)?;
    let incoming = incoming(&channel, user_id, body)?;

    let outcome = state
        .processor
        .process(incoming, ProcessingMode::AsyncBackground)
        .await?;

    match outcome {
        ProcessingOutcome::Accepted {
            request_id,
            session_id,
        } => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "request_id": request_id,
                "session_id": session_id,
                "status": "accepted",
            })),
        )),
        ProcessingOutcome::RateLimited => Ok(rate_limited()),
        _ => unreachable!("async modes only accept or rate-limit"),
    }
}

/// `POST /api/v1/requests/:channel/sync?timeout=N` — block until response
/// or timeout.
pub async fn submit_sync(
    State(state): State<AppState>,
    Path(channel): Path<String>,
    Query(params): Query<SyncParams>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<(StatusCode, Json<Value>)> {
    let user_id = resolved_user(&headers)?;
    let incoming = incoming(&channel, user_id, body)?;
    let timeout = params
        .timeout
        .map(std::time::Duration::from_secs)
        .unwrap_or(state.config.sync_timeout);

    let outcome = state
        .processor
        .process(incoming, ProcessingMode::Sync { timeout })
        .await?;

    match outcome {
        ProcessingOutcome::Completed {
            request_id,
            session_id,
            agent_id,
            content,
        } => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "request_id": request_id,
                "session_id": session_id,
                "agent_id": agent_id,
                "content": content,
                "status": "completed",
            })),
        )),
        // The request stays in flight; only the wait gave up.
        ProcessingOutcome::TimedOut {
            request_id,
            session_id,
        } => Ok((
            StatusCode::GATEWAY_TIMEOUT,
            Json(serde_json::json!({
                "request_id": request_id,
                "session_id": session_id,
                "status": "timed_out",
            })),
        )),
        ProcessingOutcome::RateLimited => Ok(rate_limited()),
        ProcessingOutcome::Accepted { .. } => {
            unreachable!("sync mode never returns bare acceptance")
        }
    }
}

fn rate_limited() -> (StatusCode, Json<Value>) {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(serde_json::json!({
            "error": "too many requests, slow down",
            "status": "rate_limited",
        })),
    )
}

/// `GET /api/v1/requests/:id` — request status and response, if any.
pub async fn request_status(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>> {
    let log = request_log::get(state.db.pool(), &request_id).await?;

    let status = if log.response_content.is_some() {
        "completed"
    } else {
        "processing"
    };

    Ok(Json(serde_json::json!({
        "request_id": log.request_id,
        "session_id": log.session_id,
        "request_type": log.request_type,
        "agent_id": log.agent_id,
        "response_content": log.response_content,
        "processing_time_ms": log.processing_time_ms,
        "completed_at": log.completed_at,
        "created_at": log.created_at,
        "status": status,
    })))
}
