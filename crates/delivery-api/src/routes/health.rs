//! Health check handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use crate::state::AppState;

/// `GET /health` — probe the database and every integration handler.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db_ok = state.db.ping().await;

    let mut handlers = serde_json::Map::new();
    for (kind, ok) in state.engine.handlers().health_checks().await {
        handlers.insert(kind.as_str().to_string(), Value::Bool(ok));
    }

    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(serde_json::json!({
            "status": if db_ok { "ok" } else { "degraded" },
            "database": db_ok,
            "handlers": handlers,
        })),
    )
}
