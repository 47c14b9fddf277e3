//! Delivery log CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{DeliveryLog, DeliveryStatus, NewDeliveryLog};
use crate::now_rfc3339;

const SELECT_COLUMNS: &str = r#"
    id, request_id, session_id, user_id, integration_config_id,
    integration_type, subject, content, template_used, status, attempts,
    max_attempts, first_attempt_at, last_attempt_at, delivered_at, expires_at,
    error_message, integration_metadata, created_at
"#;

/// Insert a pending delivery log row and return its id.
pub async fn create(pool: &SqlitePool, new: &NewDeliveryLog) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO delivery_logs (
            request_id, session_id, user_id, integration_config_id,
            integration_type, subject, content, template_used, status,
            attempts, max_attempts, expires_at, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', 0, ?, ?, ?)
        "#,
    )
    .bind(&new.request_id)
    .bind(&new.session_id)
    .bind(&new.user_id)
    .bind(new.integration_config_id)
    .bind(&new.integration_type)
    .bind(&new.subject)
    .bind(&new.content)
    .bind(&new.template_used)
    .bind(new.max_attempts)
    .bind(&new.expires_at)
    .bind(now_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Get a delivery log by id.
pub async fn get(pool: &SqlitePool, id: i64) -> Result<DeliveryLog> {
    let log = sqlx::query_as::<_, DeliveryLog>(&format!(
        "SELECT {SELECT_COLUMNS} FROM delivery_logs WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    log.ok_or_else(|| DatabaseError::NotFound {
        entity: "DeliveryLog",
        id: id.to_string(),
    })
}

/// List deliveries for a user, most recent first.
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<DeliveryLog>> {
    let logs = sqlx::query_as::<_, DeliveryLog>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM delivery_logs
        WHERE user_id = ?
        ORDER BY created_at DESC
        LIMIT ?
        "#
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

/// Record one delivery attempt: bump the counter, stamp the attempt times,
/// and set the resulting status.
pub async fn record_attempt(
    pool: &SqlitePool,
    id: i64,
    status: DeliveryStatus,
    error_message: Option<&str>,
    integration_metadata: Option<&str>,
) -> Result<()> {
    let now = now_rfc3339();
    let delivered_at = matches!(status, DeliveryStatus::Delivered).then(|| now.clone());

    let result = sqlx::query(
        r#"
        UPDATE delivery_logs
        SET attempts = attempts + 1,
            status = ?,
            first_attempt_at = COALESCE(first_attempt_at, ?),
            last_attempt_at = ?,
            delivered_at = COALESCE(?, delivered_at),
            error_message = ?,
            integration_metadata = COALESCE(?, integration_metadata)
        WHERE id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(&now)
    .bind(&now)
    .bind(delivered_at)
    .bind(error_message)
    .bind(integration_metadata)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "DeliveryLog",
            id: id.to_string(),
        });
    }

    Ok(())
}

/// Pending deliveries that are still inside their retry horizon and have
/// attempts remaining.
pub async fn list_retryable(pool: &SqlitePool, now: &str) -> Result<Vec<DeliveryLog>> {
    let logs = sqlx::query_as::<_, DeliveryLog>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM delivery_logs
        WHERE status = 'pending'
          AND attempts < max_attempts
          AND expires_at > ?
        ORDER BY created_at ASC
        "#
    ))
    .bind(now)
    .fetch_all(pool)
    .await?;

    Ok(logs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    fn new_log(request_id: &str, expires_at: &str) -> NewDeliveryLog {
        NewDeliveryLog {
            request_id: request_id.to_string(),
            session_id: "sess-1".to_string(),
            user_id: "alice".to_string(),
            integration_config_id: 1,
            integration_type: "slack".to_string(),
            subject: None,
            content: "your laptop request is approved".to_string(),
            template_used: Some("default".to_string()),
            max_attempts: 3,
            expires_at: expires_at.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let db = test_db().await;

        let id = create(db.pool(), &new_log("req-1", "2099-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        let log = get(db.pool(), id).await.unwrap();

        assert_eq!(log.status, "pending");
        assert_eq!(log.attempts, 0);
        assert!(log.first_attempt_at.is_none());
    }

    #[tokio::test]
    async fn test_record_attempt_success() {
        let db = test_db().await;
        let id = create(db.pool(), &new_log("req-1", "2099-01-01T00:00:00+00:00"))
            .await
            .unwrap();

        record_attempt(db.pool(), id, DeliveryStatus::Delivered, None, None)
            .await
            .unwrap();

        let log = get(db.pool(), id).await.unwrap();
        assert_eq!(log.status, "delivered");
        assert_eq!(log.attempts, 1);
        assert!(log.delivered_at.is_some());
        assert!(log.first_attempt_at.is_some());
    }

    #[tokio::test]
    async fn test_record_attempt_failure_keeps_first_attempt_time() {
        let db = test_db().await;
        let id = create(db.pool(), &new_log("req-1", "2099-01-01T00:00:00+00:00"))
            .await
            .unwrap();

        record_attempt(
            db.pool(),
            id,
            DeliveryStatus::Pending,
            Some("timeout"),
            None,
        )
        .await
        .unwrap();
        let first = get(db.pool(), id).await.unwrap();

        record_attempt(db.pool(), id, DeliveryStatus::Failed, Some("timeout"), None)
            .await
            .unwrap();
        let second = get(db.pool(), id).await.unwrap();

        assert_eq!(second.attempts, 2);
        assert_eq!(second.status, "failed");
        assert_eq!(second.first_attempt_at, first.first_attempt_at);
        assert_eq!(second.error_message.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_list_retryable_excludes_expired_and_exhausted() {
        let db = test_db().await;

        let live = create(db.pool(), &new_log("req-1", "2099-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        let expired = create(db.pool(), &new_log("req-2", "2000-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        let exhausted = create(db.pool(), &new_log("req-3", "2099-01-01T00:00:00+00:00"))
            .await
            .unwrap();
        for _ in 0..3 {
            record_attempt(db.pool(), exhausted, DeliveryStatus::Pending, Some("x"), None)
                .await
                .unwrap();
        }

        let retryable = list_retryable(db.pool(), &now_rfc3339()).await.unwrap();
        let ids: Vec<i64> = retryable.iter().map(|l| l.id).collect();
        assert!(ids.contains(&live));
        assert!(!ids.contains(&expired));
        assert!(!ids.contains(&exhausted));
    }
}
