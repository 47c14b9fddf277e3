//! Direct-call delivery endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use delivery_engine::DeliveryRequest;
use events::AgentResponse;

use crate::error::Result;
use crate::state::AppState;

/// `POST /deliver` — fan a finished response out to the user's integrations.
///
/// This is how the request manager reaches us in direct mode; in event mode
/// the same payload arrives wrapped in an envelope on `/events`.
pub async fn deliver(
    State(state): State<AppState>,
    Json(response): Json<AgentResponse>,
) -> Result<Json<Value>> {
    let request = DeliveryRequest::from_response(&response);
    let results = state.engine.dispatch(&request).await?;

    let results: Vec<Value> = results
        .iter()
        .map(|r| {
            serde_json::json!({
                "integration_type": r.integration_type,
                "delivery_log_id": r.delivery_log_id,
                "status": r.status.as_str(),
                "attempts": r.attempts,
                "error": r.error,
            })
        })
        .collect();

    Ok(Json(serde_json::json!({
        "request_id": response.request_id,
        "user_id": response.user_id,
        "deliveries": results,
    })))
}
