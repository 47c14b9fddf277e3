//! Session CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::{NewSession, Session, SessionStatus};
use crate::now_rfc3339;

const SELECT_COLUMNS: &str = r#"
    session_id, user_id, integration_type, channel_id, thread_id,
    current_agent_id, status, total_requests, runtime_session_id,
    integration_metadata, created_at, updated_at, last_request_at
"#;

/// Create a new session.
pub async fn create(pool: &SqlitePool, new: &NewSession) -> Result<Session> {
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO sessions (
            session_id, user_id, integration_type, channel_id, thread_id,
            status, total_requests, integration_metadata, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, 'ACTIVE', 0, ?, ?, ?)
        "#,
    )
    .bind(&new.session_id)
    .bind(&new.user_id)
    .bind(&new.integration_type)
    .bind(&new.channel_id)
    .bind(&new.thread_id)
    .bind(&new.integration_metadata)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .map_err(|e| DatabaseError::on_insert(e, "Session", &new.session_id))?;

    get(pool, &new.session_id).await
}

/// Get a session by id.
pub async fn get(pool: &SqlitePool, session_id: &str) -> Result<Session> {
    let session = sqlx::query_as::<_, Session>(&format!(
        "SELECT {SELECT_COLUMNS} FROM sessions WHERE session_id = ?"
    ))
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    session.ok_or_else(|| DatabaseError::NotFound {
        entity: "Session",
        id: session_id.to_string(),
    })
}

/// Find the active session for a user on a channel, if one exists.
///
/// `channel_id` and `thread_id` are matched null-safely: a caller with no
/// channel only matches sessions created with no channel.
pub async fn find_active(
    pool: &SqlitePool,
    user_id: &str,
    integration_type: &str,
    channel_id: Option<&str>,
    thread_id: Option<&str>,
) -> Result<Option<Session>> {
    let session = sqlx::query_as::<_, Session>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM sessions
        WHERE user_id = ?
          AND integration_type = ?
          AND channel_id IS ?
          AND thread_id IS ?
          AND status = 'ACTIVE'
        ORDER BY created_at DESC
        LIMIT 1
        "#
    ))
    .bind(user_id)
    .bind(integration_type)
    .bind(channel_id)
    .bind(thread_id)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

/// List sessions for a user, most recent first.
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<Session>> {
    let sessions = sqlx::query_as::<_, Session>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM sessions
        WHERE user_id = ?
        ORDER BY created_at DESC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(sessions)
}

/// Set the session's current agent.
pub async fn set_current_agent(
    pool: &SqlitePool,
    session_id: &str,
    agent_id: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET current_agent_id = ?, updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(agent_id)
    .bind(now_rfc3339())
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

/// Set or clear the agent-runtime conversation handle.
pub async fn set_runtime_session(
    pool: &SqlitePool,
    session_id: &str,
    runtime_session_id: Option<&str>,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET runtime_session_id = ?, updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(runtime_session_id)
    .bind(now_rfc3339())
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

/// Set the session status.
pub async fn set_status(
    pool: &SqlitePool,
    session_id: &str,
    status: SessionStatus,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET status = ?, updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(status.as_str())
    .bind(now_rfc3339())
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

/// Replace the integration metadata snapshot.
pub async fn set_integration_metadata(
    pool: &SqlitePool,
    session_id: &str,
    metadata: &str,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET integration_metadata = ?, updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(metadata)
    .bind(now_rfc3339())
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

/// Increment the request counter and stamp `last_request_at`.
pub async fn increment_request_count(pool: &SqlitePool, session_id: &str) -> Result<()> {
    let now = now_rfc3339();

    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET total_requests = total_requests + 1,
            last_request_at = ?,
            updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(&now)
    .bind(&now)
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

/// Reset a session: deactivate it and clear the agent assignment and runtime
/// handle. The user's next request starts a fresh session at the default
/// agent.
pub async fn reset(pool: &SqlitePool, session_id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET current_agent_id = NULL,
            runtime_session_id = NULL,
            status = 'INACTIVE',
            updated_at = ?
        WHERE session_id = ?
        "#,
    )
    .bind(now_rfc3339())
    .bind(session_id)
    .execute(pool)
    .await?;

    ensure_found(result.rows_affected(), session_id)
}

fn ensure_found(rows_affected: u64, session_id: &str) -> Result<()> {
    if rows_affected == 0 {
        return Err(DatabaseError::NotFound {
            entity: "Session",
            id: session_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    fn new_session(id: &str, user: &str) -> NewSession {
        NewSession {
            session_id: id.to_string(),
            user_id: user.to_string(),
            integration_type: "slack".to_string(),
            channel_id: Some("C123".to_string()),
            thread_id: None,
            integration_metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let db = test_db().await;

        let created = create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();
        assert_eq!(created.status, "ACTIVE");
        assert_eq!(created.total_requests, 0);
        assert!(created.current_agent_id.is_none());

        let fetched = get(db.pool(), "sess-1").await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_create_duplicate_fails() {
        let db = test_db().await;

        create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();
        let err = create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_find_active_matches_null_channel_exactly() {
        let db = test_db().await;

        create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();

        // Same user, no channel: must not match the C123 session.
        let found = find_active(db.pool(), "alice", "slack", None, None)
            .await
            .unwrap();
        assert!(found.is_none());

        let found = find_active(db.pool(), "alice", "slack", Some("C123"), None)
            .await
            .unwrap();
        assert_eq!(found.unwrap().session_id, "sess-1");
    }

    #[tokio::test]
    async fn test_find_active_ignores_inactive() {
        let db = test_db().await;

        create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();
        set_status(db.pool(), "sess-1", SessionStatus::Inactive)
            .await
            .unwrap();

        let found = find_active(db.pool(), "alice", "slack", Some("C123"), None)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_targeted_updates() {
        let db = test_db().await;

        create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();

        set_current_agent(db.pool(), "sess-1", "laptop-refresh")
            .await
            .unwrap();
        set_runtime_session(db.pool(), "sess-1", Some("rt-42"))
            .await
            .unwrap();
        increment_request_count(db.pool(), "sess-1").await.unwrap();

        let session = get(db.pool(), "sess-1").await.unwrap();
        assert_eq!(session.current_agent_id.as_deref(), Some("laptop-refresh"));
        assert_eq!(session.runtime_session_id.as_deref(), Some("rt-42"));
        assert_eq!(session.total_requests, 1);
        assert!(session.last_request_at.is_some());
    }

    #[tokio::test]
    async fn test_reset_deactivates_and_clears_agent_state() {
        let db = test_db().await;

        create(db.pool(), &new_session("sess-1", "alice"))
            .await
            .unwrap();
        set_current_agent(db.pool(), "sess-1", "laptop-refresh")
            .await
            .unwrap();
        set_runtime_session(db.pool(), "sess-1", Some("rt-42"))
            .await
            .unwrap();

        reset(db.pool(), "sess-1").await.unwrap();

        let session = get(db.pool(), "sess-1").await.unwrap();
        assert!(session.current_agent_id.is_none());
        assert!(session.runtime_session_id.is_none());
        assert_eq!(session.status, "INACTIVE");

        // The reset session no longer matches ingress lookups.
        let found = find_active(db.pool(), "alice", "slack", Some("C123"), None)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_session_is_not_found() {
        let db = test_db().await;

        let err = set_current_agent(db.pool(), "nope", "agent")
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
