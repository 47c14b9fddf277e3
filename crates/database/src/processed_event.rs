//! Processed-event ledger operations.
//!
//! The ledger gives every event sink at-most-once effects: the primary key on
//! `event_id` means a redelivered envelope either reads its prior outcome or
//! loses the insert race, and in both cases skips its side effects.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::{ProcessedEvent, ProcessingResult};
use crate::now_rfc3339;

/// Look up the ledger entry for an event id.
pub async fn get(pool: &SqlitePool, event_id: &str) -> Result<Option<ProcessedEvent>> {
    let event = sqlx::query_as::<_, ProcessedEvent>(
        r#"
        SELECT event_id, event_type, event_source, request_id, session_id,
               processed_by, processing_result, error_message, created_at
        FROM processed_events
        WHERE event_id = ?
        "#,
    )
    .bind(event_id)
    .fetch_optional(pool)
    .await?;

    Ok(event)
}

/// Record an event in the ledger.
///
/// Returns `true` if this call inserted the entry, `false` if the event was
/// already recorded. Losing the insert race is expected under redelivery and
/// is not an error.
#[allow(clippy::too_many_arguments)]
pub async fn record_if_new(
    pool: &SqlitePool,
    event_id: &str,
    event_type: &str,
    event_source: &str,
    request_id: Option<&str>,
    session_id: Option<&str>,
    processed_by: &str,
    result: ProcessingResult,
    error_message: Option<&str>,
) -> Result<bool> {
    let outcome = sqlx::query(
        r#"
        INSERT INTO processed_events (
            event_id, event_type, event_source, request_id, session_id,
            processed_by, processing_result, error_message, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(event_id)
    .bind(event_type)
    .bind(event_source)
    .bind(request_id)
    .bind(session_id)
    .bind(processed_by)
    .bind(result.as_str())
    .bind(error_message)
    .bind(now_rfc3339())
    .execute(pool)
    .await;

    match outcome {
        Ok(_) => Ok(true),
        Err(e) if crate::error::is_duplicate_key(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
