//! The agent runtime seam.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Result of one agent turn.
#[derive(Debug, Clone)]
pub struct AgentTurn {
    /// The agent's free-text output.
    pub content: String,
    /// Runtime conversation handle to reuse on the next turn.
    pub runtime_session_id: Option<String>,
    pub processing_time_ms: i64,
}

/// Executes agent turns against the external runtime.
///
/// The runtime is an opaque network service; this trait is the only place
/// the orchestrator touches it, so tests can script it.
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    /// Run one turn for `agent_id`. A `None` runtime session opens a fresh
    /// conversation; the runtime returns the handle to continue it.
    async fn run_turn(
        &self,
        agent_id: &str,
        runtime_session_id: Option<&str>,
        message: &str,
    ) -> Result<AgentTurn>;
}

/// HTTP client for the agent runtime service.
pub struct HttpAgentRuntime {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct TurnRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    session_id: Option<&'a str>,
    message: &'a str,
}

#[derive(Deserialize)]
struct TurnResponse {
    content: String,
    #[serde(default)]
    session_id: Option<String>,
    #[serde(default)]
    processing_time_ms: Option<i64>,
}

impl HttpAgentRuntime {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }
}

#[async_trait]
impl AgentRuntime for HttpAgentRuntime {
    async fn run_turn(
        &self,
        agent_id: &str,
        runtime_session_id: Option<&str>,
        message: &str,
    ) -> Result<AgentTurn> {
        let started = std::time::Instant::now();
        let url = format!("{}/api/v1/agents/{}/turns", self.base_url, agent_id);

        let response: TurnResponse = self
            .http
            .post(&url)
            .json(&TurnRequest {
                session_id: runtime_session_id,
                message,
            })
            .send()
            .await
            .map_err(|e| OrchestratorError::Runtime(format!("{agent_id}: {e}")))?
            .error_for_status()
            .map_err(|e| OrchestratorError::Runtime(format!("{agent_id}: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::Runtime(format!("{agent_id}: {e}")))?;

        Ok(AgentTurn {
            content: response.content,
            runtime_session_id: response.session_id,
            processing_time_ms: response
                .processing_time_ms
                .unwrap_or_else(|| started.elapsed().as_millis() as i64),
        })
    }
}
