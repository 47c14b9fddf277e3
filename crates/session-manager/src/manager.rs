//! Session lifecycle operations over the database.

use tracing::{info, warn};
use uuid::Uuid;

use database::{session as session_store, Database, NewSession, Result, Session, SessionStatus};

/// Partial session update. Only the fields set to `Some` are written; each
/// goes through its own targeted UPDATE so concurrent writers for the same
/// session never clobber each other's fields.
#[derive(Debug, Default, Clone)]
pub struct SessionUpdate {
    pub current_agent_id: Option<String>,
    pub status: Option<SessionStatus>,
    /// `Some(None)` clears the handle, `Some(Some(id))` sets it.
    pub runtime_session_id: Option<Option<String>>,
    pub integration_metadata: Option<String>,
}

/// Manages durable conversational sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: Database,
}

impl SessionManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Return the ACTIVE session for the (user, channel) tuple, creating one
    /// if none exists. New sessions start with no assigned agent.
    pub async fn find_or_create_session(
        &self,
        user_id: &str,
        integration_type: &str,
        channel_id: Option<&str>,
        thread_id: Option<&str>,
    ) -> Result<Session> {
        if let Some(existing) = session_store::find_active(
            self.db.pool(),
            user_id,
            integration_type,
            channel_id,
            thread_id,
        )
        .await?
        {
            return Ok(existing);
        }

        let new = NewSession {
            session_id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            integration_type: integration_type.to_string(),
            channel_id: channel_id.map(str::to_string),
            thread_id: thread_id.map(str::to_string),
            integration_metadata: None,
        };

        let session = session_store::create(self.db.pool(), &new).await?;
        info!(
            session_id = %session.session_id,
            user_id = %user_id,
            integration_type = %integration_type,
            "Created session"
        );

        Ok(session)
    }

    /// Get a session by id.
    pub async fn get_session(&self, session_id: &str) -> Result<Session> {
        session_store::get(self.db.pool(), session_id).await
    }

    /// List a user's sessions, most recent first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        session_store::list_for_user(self.db.pool(), user_id).await
    }

    /// Apply a partial update and return the resulting session.
    pub async fn update_session(
        &self,
        session_id: &str,
        update: SessionUpdate,
    ) -> Result<Session> {
        if let Some(agent_id) = &update.current_agent_id {
            session_store::set_current_agent(self.db.pool(), session_id, agent_id).await?;
        }
        if let Some(status) = update.status {
            session_store::set_status(self.db.pool(), session_id, status).await?;
        }
        if let Some(handle) = &update.runtime_session_id {
            session_store::set_runtime_session(self.db.pool(), session_id, handle.as_deref())
                .await?;
        }
        if let Some(metadata) = &update.integration_metadata {
            session_store::set_integration_metadata(self.db.pool(), session_id, metadata).await?;
        }

        session_store::get(self.db.pool(), session_id).await
    }

    /// Bump the request counter. Failures are logged and swallowed: losing a
    /// counter increment must never abort the request pipeline.
    pub async fn increment_request_count(&self, session_id: &str, request_id: &str) {
        if let Err(e) =
            session_store::increment_request_count(self.db.pool(), session_id).await
        {
            warn!(
                session_id = %session_id,
                request_id = %request_id,
                error = %e,
                "Failed to increment session request count"
            );
        }
    }

    /// Reset a session: deactivate it and clear the agent assignment and
    /// runtime handle. The next request on the same channel starts fresh at
    /// the default agent.
    pub async fn reset_session(&self, session_id: &str) -> Result<Session> {
        session_store::reset(self.db.pool(), session_id).await?;
        session_store::get(self.db.pool(), session_id).await
    }

    /// Deactivate a session so it no longer matches ingress lookups.
    pub async fn deactivate_session(&self, session_id: &str) -> Result<Session> {
        session_store::set_status(self.db.pool(), session_id, SessionStatus::Inactive).await?;
        session_store::get(self.db.pool(), session_id).await
    }
}
