//! Request log CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewRequestLog, RequestLog, ResponseUpdate};
use crate::now_rfc3339;

const SELECT_COLUMNS: &str = r#"
    request_id, session_id, request_type, request_content, normalized_request,
    agent_id, response_content, response_metadata, processing_time_ms,
    completed_at, event_id, event_type, created_at
"#;

/// Insert a request log row.
pub async fn create(pool: &SqlitePool, new: &NewRequestLog) -> Result<RequestLog> {
    sqlx::query(
        r#"
        INSERT INTO request_logs (
            request_id, session_id, request_type, request_content,
            normalized_request, agent_id, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&new.request_id)
    .bind(&new.session_id)
    .bind(&new.request_type)
    .bind(&new.request_content)
    .bind(&new.normalized_request)
    .bind(&new.agent_id)
    .bind(now_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_insert(e, "RequestLog", &new.request_id))?;

    get(pool, &new.request_id).await
}

/// Get a request log by id.
pub async fn get(pool: &SqlitePool, request_id: &str) -> Result<RequestLog> {
    let log = sqlx::query_as::<_, RequestLog>(&format!(
        "SELECT {SELECT_COLUMNS} FROM request_logs WHERE request_id = ?"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?;

    log.ok_or_else(|| DatabaseError::NotFound {
        entity: "RequestLog",
        id: request_id.to_string(),
    })
}

/// List request logs for a session, oldest first.
pub async fn list_for_session(pool: &SqlitePool, session_id: &str) -> Result<Vec<RequestLog>> {
    let logs = sqlx::query_as::<_, RequestLog>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM request_logs
        WHERE session_id = ?
        ORDER BY created_at ASC
        "#
    ))
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

/// Apply a response to a request only if no response has been recorded yet.
///
/// Returns `true` if this call recorded the response, `false` if another
/// writer already completed the request. The guard makes response recording
/// exactly-once under concurrent handlers.
pub async fn set_response_if_unset(
    pool: &SqlitePool,
    request_id: &str,
    update: &ResponseUpdate,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE request_logs
        SET agent_id = COALESCE(?, agent_id),
            response_content = ?,
            response_metadata = ?,
            processing_time_ms = ?,
            completed_at = ?,
            event_id = ?,
            event_type = ?
        WHERE request_id = ? AND response_content IS NULL
        "#,
    )
    .bind(&update.agent_id)
    .bind(&update.content)
    .bind(&update.metadata)
    .bind(update.processing_time_ms)
    .bind(now_rfc3339())
    .bind(&update.event_id)
    .bind(&update.event_type)
    .bind(request_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    async fn seed(pool: &SqlitePool, request_id: &str) -> RequestLog {
        crate::session::create(
            pool,
            &crate::models::NewSession {
                session_id: "sess-1".to_string(),
                user_id: "alice".to_string(),
                integration_type: "web".to_string(),
                channel_id: None,
                thread_id: None,
                integration_metadata: None,
            },
        )
        .await
        .ok();

        create(
            pool,
            &NewRequestLog {
                request_id: request_id.to_string(),
                session_id: "sess-1".to_string(),
                request_type: "MESSAGE".to_string(),
                request_content: "I need a new laptop".to_string(),
                normalized_request: "{}".to_string(),
                agent_id: None,
            },
        )
        .await
        .unwrap()
    }

    fn response(content: &str) -> ResponseUpdate {
        ResponseUpdate {
            agent_id: Some("laptop-refresh".to_string()),
            content: content.to_string(),
            metadata: None,
            processing_time_ms: Some(120),
            event_id: Some("evt-1".to_string()),
            event_type: Some("com.helpdesk.agent.response-ready".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = test_db().await;
        let log = seed(db.pool(), "req-1").await;

        assert!(log.response_content.is_none());
        assert!(log.completed_at.is_none());

        let fetched = get(db.pool(), "req-1").await.unwrap();
        assert_eq!(fetched, log);
    }

    #[tokio::test]
    async fn test_set_response_records_once() {
        let db = test_db().await;
        seed(db.pool(), "req-1").await;

        let first = set_response_if_unset(db.pool(), "req-1", &response("here you go"))
            .await
            .unwrap();
        assert!(first);

        // A second completion attempt is a no-op.
        let second = set_response_if_unset(db.pool(), "req-1", &response("duplicate"))
            .await
            .unwrap();
        assert!(!second);

        let log = get(db.pool(), "req-1").await.unwrap();
        assert_eq!(log.response_content.as_deref(), Some("here you go"));
        assert_eq!(log.agent_id.as_deref(), Some("laptop-refresh"));
        assert!(log.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_set_response_keeps_agent_when_update_has_none() {
        let db = test_db().await;
        seed(db.pool(), "req-1").await;

        let update = ResponseUpdate {
            agent_id: None,
            ..response("done")
        };
        set_response_if_unset(db.pool(), "req-1", &update)
            .await
            .unwrap();

        let log = get(db.pool(), "req-1").await.unwrap();
        assert!(log.agent_id.is_none());
        assert_eq!(log.response_content.as_deref(), Some("done"));
    }

    #[tokio::test]
    async fn test_list_for_session_orders_oldest_first() {
        let db = test_db().await;
        seed(db.pool(), "req-1").await;
        seed(db.pool(), "req-2").await;

        let logs = list_for_session(db.pool(), "sess-1").await.unwrap();
        assert_eq!(logs.len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let db = test_db().await;
        let err = get(db.pool(), "nope").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
