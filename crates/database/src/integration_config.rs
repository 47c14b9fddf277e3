//! User integration configuration CRUD operations.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::UserIntegrationConfig;
use crate::now_rfc3339;

const SELECT_COLUMNS: &str = r#"
    id, user_id, integration_type, enabled, config, priority, retry_count,
    retry_delay_seconds, created_at, updated_at
"#;

/// Create or replace a user's configuration for one integration type.
///
/// Registration is an upsert keyed on (user, integration type) so re-posting
/// a config updates it in place.
pub async fn upsert(
    pool: &SqlitePool,
    user_id: &str,
    integration_type: &str,
    enabled: bool,
    config: &str,
    priority: i64,
    retry_count: i64,
    retry_delay_seconds: i64,
) -> Result<UserIntegrationConfig> {
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO user_integration_configs (
            user_id, integration_type, enabled, config, priority,
            retry_count, retry_delay_seconds, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (user_id, integration_type) DO UPDATE SET
            enabled = excluded.enabled,
            config = excluded.config,
            priority = excluded.priority,
            retry_count = excluded.retry_count,
            retry_delay_seconds = excluded.retry_delay_seconds,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(user_id)
    .bind(integration_type)
    .bind(enabled)
    .bind(config)
    .bind(priority)
    .bind(retry_count)
    .bind(retry_delay_seconds)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    get(pool, user_id, integration_type).await
}

/// Get one integration config for a user.
pub async fn get(
    pool: &SqlitePool,
    user_id: &str,
    integration_type: &str,
) -> Result<UserIntegrationConfig> {
    let config = sqlx::query_as::<_, UserIntegrationConfig>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM user_integration_configs
        WHERE user_id = ? AND integration_type = ?
        "#
    ))
    .bind(user_id)
    .bind(integration_type)
    .fetch_optional(pool)
    .await?;

    config.ok_or_else(|| DatabaseError::NotFound {
        entity: "UserIntegrationConfig",
        id: format!("{}/{}", user_id, integration_type),
    })
}

/// All configs for a user, highest priority first.
pub async fn list_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<UserIntegrationConfig>> {
    let configs = sqlx::query_as::<_, UserIntegrationConfig>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM user_integration_configs
        WHERE user_id = ?
        ORDER BY priority DESC, integration_type ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(configs)
}

/// Enabled configs for a user, highest priority first. This is the dispatch
/// fan-out order.
pub async fn list_enabled_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<UserIntegrationConfig>> {
    let configs = sqlx::query_as::<_, UserIntegrationConfig>(&format!(
        r#"
        SELECT {SELECT_COLUMNS}
        FROM user_integration_configs
        WHERE user_id = ? AND enabled = 1
        ORDER BY priority DESC, integration_type ASC
        "#
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(configs)
}

/// Delete one integration config.
pub async fn delete(pool: &SqlitePool, user_id: &str, integration_type: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM user_integration_configs
        WHERE user_id = ? AND integration_type = ?
        "#,
    )
    .bind(user_id)
    .bind(integration_type)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::NotFound {
            entity: "UserIntegrationConfig",
            id: format!("{}/{}", user_id, integration_type),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_db;

    #[tokio::test]
    async fn test_upsert_creates_then_updates() {
        let db = test_db().await;

        let created = upsert(db.pool(), "alice", "slack", true, "{}", 10, 3, 60)
            .await
            .unwrap();
        assert!(created.enabled);
        assert_eq!(created.priority, 10);

        let updated = upsert(db.pool(), "alice", "slack", false, r#"{"c":"C1"}"#, 5, 3, 60)
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert!(!updated.enabled);
        assert_eq!(updated.priority, 5);
        assert_eq!(updated.config, r#"{"c":"C1"}"#);
    }

    #[tokio::test]
    async fn test_list_enabled_orders_by_priority_desc() {
        let db = test_db().await;

        upsert(db.pool(), "alice", "email", true, "{}", 1, 3, 60)
            .await
            .unwrap();
        upsert(db.pool(), "alice", "slack", true, "{}", 10, 3, 60)
            .await
            .unwrap();
        upsert(db.pool(), "alice", "webhook", false, "{}", 99, 3, 60)
            .await
            .unwrap();

        let enabled = list_enabled_for_user(db.pool(), "alice").await.unwrap();
        let types: Vec<&str> = enabled.iter().map(|c| c.integration_type.as_str()).collect();
        assert_eq!(types, vec!["slack", "email"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let db = test_db().await;
        let err = delete(db.pool(), "alice", "slack").await.unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }
}
