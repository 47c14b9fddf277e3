//! Per-user integration config management and the delivery audit trail.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use database::{delivery_log, integration_config, UserIntegrationConfig};
use delivery_engine::DeliveryKind;

use crate::error::{ApiError, Result};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertBody {
    pub integration_type: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_retry_count")]
    pub retry_count: i64,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: i64,
}

fn default_enabled() -> bool {
    true
}

fn default_retry_count() -> i64 {
    3
}

fn default_retry_delay() -> i64 {
    60
}

#[derive(Debug, Deserialize)]
pub struct DeliveriesParams {
    pub limit: Option<i64>,
}

fn config_json(config: &UserIntegrationConfig) -> Value {
    serde_json::json!({
        "id": config.id,
        "user_id": config.user_id,
        "integration_type": config.integration_type,
        "enabled": config.enabled,
        "config": serde_json::from_str::<Value>(&config.config).unwrap_or(Value::Null),
        "priority": config.priority,
        "retry_count": config.retry_count,
        "retry_delay_seconds": config.retry_delay_seconds,
        "created_at": config.created_at,
        "updated_at": config.updated_at,
    })
}

/// `POST /api/v1/users/:user_id/integrations` — register or replace one
/// integration config.
pub async fn upsert(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<UpsertBody>,
) -> Result<(StatusCode, Json<Value>)> {
    if DeliveryKind::parse(&body.integration_type).is_none() {
        return Err(ApiError::BadRequest(format!(
            "unknown integration type: {}",
            body.integration_type
        )));
    }
    if body.retry_count < 1 {
        return Err(ApiError::BadRequest(
            "retry_count must be at least 1".to_string(),
        ));
    }

    let config = integration_config::upsert(
        state.db.pool(),
        &user_id,
        &body.integration_type,
        body.enabled,
        &body.config.to_string(),
        body.priority,
        body.retry_count,
        body.retry_delay_seconds,
    )
    .await?;

    Ok((StatusCode::OK, Json(config_json(&config))))
}

/// `GET /api/v1/users/:user_id/integrations`
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Value>> {
    let configs = integration_config::list_for_user(state.db.pool(), &user_id).await?;
    let configs: Vec<Value> = configs.iter().map(config_json).collect();

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "integrations": configs,
    })))
}

/// `DELETE /api/v1/users/:user_id/integrations/:integration_type`
pub async fn remove(
    State(state): State<AppState>,
    Path((user_id, integration_type)): Path<(String, String)>,
) -> Result<StatusCode> {
    integration_config::delete(state.db.pool(), &user_id, &integration_type).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/v1/users/:user_id/deliveries` — recent delivery attempts.
pub async fn deliveries(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<DeliveriesParams>,
) -> Result<Json<Value>> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let logs = delivery_log::list_for_user(state.db.pool(), &user_id, limit).await?;

    let logs: Vec<Value> = logs
        .iter()
        .map(|log| {
            serde_json::json!({
                "id": log.id,
                "request_id": log.request_id,
                "session_id": log.session_id,
                "integration_type": log.integration_type,
                "subject": log.subject,
                "status": log.status,
                "attempts": log.attempts,
                "max_attempts": log.max_attempts,
                "error_message": log.error_message,
                "first_attempt_at": log.first_attempt_at,
                "delivered_at": log.delivered_at,
                "expires_at": log.expires_at,
                "created_at": log.created_at,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "deliveries": logs,
    })))
}
