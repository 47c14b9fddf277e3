//! Inbound envelope ingestion.

use axum::extract::State;
use axum::Json;
use serde_json::Value;

use database::ProcessingResult;
use events::EventEnvelope;
use orchestrator::SinkOutcome;

use crate::error::Result;
use crate::state::AppState;

/// `POST /api/v1/events` — consume a broker envelope.
pub async fn ingest(
    State(state): State<AppState>,
    Json(envelope): Json<EventEnvelope>,
) -> Result<Json<Value>> {
    let outcome = state.sink.handle_envelope(&envelope).await?;

    let body = match outcome {
        SinkOutcome::RejectedSelfSource => serde_json::json!({
            "event_id": envelope.id,
            "status": "rejected",
            "reason": "self_source",
        }),
        SinkOutcome::AlreadyProcessed => serde_json::json!({
            "event_id": envelope.id,
            "status": ProcessingResult::Skipped.as_str(),
            "reason": "already_processed",
        }),
        SinkOutcome::Processed(result) => serde_json::json!({
            "event_id": envelope.id,
            "status": "processed",
            "result": result.as_str(),
        }),
    };

    Ok(Json(body))
}
