//! Read-through cache of available agent names.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{OrchestratorError, Result};

/// Source of truth for which agents exist.
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn list_agents(&self) -> Result<Vec<String>>;
}

/// Directory backed by the agent manager's HTTP API.
pub struct HttpAgentDirectory {
    http: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AgentEntry {
    agent_id: String,
}

impl HttpAgentDirectory {
    pub fn new(base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http, base_url }
    }
}

#[async_trait]
impl AgentDirectory for HttpAgentDirectory {
    async fn list_agents(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/v1/agents", self.base_url);
        let entries: Vec<AgentEntry> = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| OrchestratorError::Dependency(format!("agent directory: {e}")))?
            .error_for_status()
            .map_err(|e| OrchestratorError::Dependency(format!("agent directory: {e}")))?
            .json()
            .await
            .map_err(|e| OrchestratorError::Dependency(format!("agent directory: {e}")))?;

        Ok(entries.into_iter().map(|e| e.agent_id).collect())
    }
}

/// Fixed directory for tests and single-tenant deployments.
pub struct StaticAgentDirectory {
    agents: Vec<String>,
}

impl StaticAgentDirectory {
    pub fn new(agents: &[&str]) -> Self {
        Self {
            agents: agents.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl AgentDirectory for StaticAgentDirectory {
    async fn list_agents(&self) -> Result<Vec<String>> {
        Ok(self.agents.clone())
    }
}

/// Staleness policy for the registry cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPolicy {
    /// Hit the directory on every read. Routing decisions use this so a
    /// just-registered agent is immediately routable.
    AlwaysRefresh,
    /// Only hit the directory when the cache is empty.
    RefreshIfEmpty,
}

/// Explicitly constructed, explicitly passed registry of agent names.
///
/// Holds its own staleness policy; callers receive it by reference rather
/// than reaching for shared global state. Directory failures fall back to
/// the last known set with a warning.
pub struct AgentRegistry {
    directory: Arc<dyn AgentDirectory>,
    policy: RefreshPolicy,
    default_agent: String,
    cache: RwLock<Vec<String>>,
}

impl AgentRegistry {
    pub fn new(
        directory: Arc<dyn AgentDirectory>,
        policy: RefreshPolicy,
        default_agent: String,
    ) -> Self {
        Self {
            directory,
            policy,
            default_agent,
            cache: RwLock::new(Vec::new()),
        }
    }

    /// The configured default ("router") agent.
    pub fn default_agent(&self) -> &str {
        &self.default_agent
    }

    /// Current set of known agent names, per the refresh policy.
    pub async fn agents(&self) -> Vec<String> {
        let needs_refresh = match self.policy {
            RefreshPolicy::AlwaysRefresh => true,
            RefreshPolicy::RefreshIfEmpty => self.cache.read().await.is_empty(),
        };

        if needs_refresh {
            match self.directory.list_agents().await {
                Ok(agents) => {
                    *self.cache.write().await = agents;
                }
                Err(e) => {
                    warn!(error = %e, "Agent directory refresh failed, using cached set");
                }
            }
        }

        self.cache.read().await.clone()
    }

    /// Case-insensitive membership check.
    pub async fn contains(&self, agent_id: &str) -> bool {
        self.agents()
            .await
            .iter()
            .any(|a| a.eq_ignore_ascii_case(agent_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingDirectory {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AgentDirectory for CountingDirectory {
        async fn list_agents(&self) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec!["router".to_string(), "laptop-refresh".to_string()])
        }
    }

    #[tokio::test]
    async fn test_refresh_if_empty_hits_directory_once() {
        let dir = Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
        });
        let registry = AgentRegistry::new(
            dir.clone(),
            RefreshPolicy::RefreshIfEmpty,
            "router".to_string(),
        );

        registry.agents().await;
        registry.agents().await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_always_refresh_hits_directory_every_read() {
        let dir = Arc::new(CountingDirectory {
            calls: AtomicUsize::new(0),
        });
        let registry = AgentRegistry::new(
            dir.clone(),
            RefreshPolicy::AlwaysRefresh,
            "router".to_string(),
        );

        registry.agents().await;
        registry.agents().await;
        assert_eq!(dir.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_contains_is_case_insensitive() {
        let registry = AgentRegistry::new(
            Arc::new(StaticAgentDirectory::new(&["router", "laptop-refresh"])),
            RefreshPolicy::RefreshIfEmpty,
            "router".to_string(),
        );

        assert!(registry.contains("Laptop-Refresh").await);
        assert!(!registry.contains("unknown").await);
    }

    struct FailingDirectory;

    #[async_trait]
    impl AgentDirectory for FailingDirectory {
        async fn list_agents(&self) -> Result<Vec<String>> {
            Err(OrchestratorError::Dependency("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_directory_failure_falls_back_to_cache() {
        let registry = AgentRegistry::new(
            Arc::new(FailingDirectory),
            RefreshPolicy::AlwaysRefresh,
            "router".to_string(),
        );

        // Nothing cached yet, failure yields an empty set rather than an error.
        assert!(registry.agents().await.is_empty());
    }
}
