//! The unified request processor.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use database::{request_log, Database, NewRequestLog};
use events::{event_types, service_sources, AgentResponse, EventEnvelope, EventPublisher,
    NormalizedRequest, ResponseType};
use session_manager::{IngressRateLimiter, RuntimeSessionCache, SessionManager, SessionUpdate};

use crate::error::{OrchestratorError, Result};
use crate::normalizer::{IncomingRequest, RequestNormalizer};
use crate::registry::AgentRegistry;
use crate::response::ResponseHandler;
use crate::runtime::AgentRuntime;
use crate::strategy::{CommunicationStrategy, WaitOutcome};

/// How the caller wants to observe completion.
#[derive(Debug, Clone, Copy)]
pub enum ProcessingMode {
    /// Accept and return immediately; the response resolves later through
    /// the transport.
    Async,
    /// Accept and return immediately, but run the turn and delivery in a
    /// detached background task with its own failure boundary.
    AsyncBackground,
    /// Block the caller until the response is ready or the timeout passes.
    Sync { timeout: Duration },
}

/// What the caller gets back.
#[derive(Debug)]
pub enum ProcessingOutcome {
    /// Rejected by the advisory ingress rate limiter.
    RateLimited,
    /// Durably accepted; resolution happens out of band.
    Accepted {
        request_id: String,
        session_id: String,
    },
    /// Completed within the call.
    Completed {
        request_id: String,
        session_id: String,
        agent_id: String,
        content: String,
    },
    /// Sync wait expired. Processing continues; the eventual response is
    /// still persisted and delivered.
    TimedOut {
        request_id: String,
        session_id: String,
    },
}

/// Accepts requests from every channel and drives them to completion
/// through the configured communication strategy.
pub struct RequestProcessor {
    db: Database,
    sessions: SessionManager,
    normalizer: RequestNormalizer,
    rate_limiter: Arc<IngressRateLimiter>,
    runtime_cache: Arc<RuntimeSessionCache>,
    registry: Arc<AgentRegistry>,
    runtime: Arc<dyn AgentRuntime>,
    strategy: Arc<dyn CommunicationStrategy>,
    /// Set when the deployment executes agent turns inline (direct mode)
    /// instead of through the broker.
    inline_execution: bool,
    /// Best-effort announcement channel for session lifecycle events.
    publisher: Option<EventPublisher>,
}

impl RequestProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Database,
        sessions: SessionManager,
        rate_limiter: Arc<IngressRateLimiter>,
        runtime_cache: Arc<RuntimeSessionCache>,
        registry: Arc<AgentRegistry>,
        runtime: Arc<dyn AgentRuntime>,
        strategy: Arc<dyn CommunicationStrategy>,
        inline_execution: bool,
        publisher: Option<EventPublisher>,
    ) -> Self {
        Self {
            db,
            sessions,
            normalizer: RequestNormalizer::new(),
            rate_limiter,
            runtime_cache,
            registry,
            runtime,
            strategy,
            inline_execution,
            publisher,
        }
    }

    fn response_handler(&self) -> ResponseHandler {
        ResponseHandler::new(
            self.db.clone(),
            self.sessions.clone(),
            self.runtime_cache.clone(),
            self.registry.clone(),
            self.runtime.clone(),
            self.strategy.clone(),
        )
    }

    /// Accept one incoming request and process it per `mode`.
    pub async fn process(
        &self,
        incoming: IncomingRequest,
        mode: ProcessingMode,
    ) -> Result<ProcessingOutcome> {
        if !self
            .rate_limiter
            .check(&incoming.user_id, incoming.channel.as_str())
            .await
        {
            return Ok(ProcessingOutcome::RateLimited);
        }

        let request = self.accept(&incoming).await?;
        let request_id = request.request_id.clone();
        let session_id = request.session_id.clone();

        match mode {
            ProcessingMode::Async if !self.inline_execution => {
                if !self.strategy.send_request(&request).await {
                    return Err(OrchestratorError::Dependency(
                        "failed to publish request".to_string(),
                    ));
                }
                Ok(ProcessingOutcome::Accepted {
                    request_id,
                    session_id,
                })
            }
            ProcessingMode::Async | ProcessingMode::AsyncBackground => {
                self.spawn_background(request);
                Ok(ProcessingOutcome::Accepted {
                    request_id,
                    session_id,
                })
            }
            ProcessingMode::Sync { timeout } => {
                if self.inline_execution {
                    let response = self.execute_turn(&request).await?;
                    let final_response = self.response_handler().handle(response).await?;
                    Ok(ProcessingOutcome::Completed {
                        request_id,
                        session_id,
                        agent_id: final_response.agent_id,
                        content: final_response.content,
                    })
                } else {
                    if !self.strategy.send_request(&request).await {
                        return Err(OrchestratorError::Dependency(
                            "failed to publish request".to_string(),
                        ));
                    }
                    match self.strategy.wait_for_response(&request_id, timeout).await {
                        WaitOutcome::Completed(log) => Ok(ProcessingOutcome::Completed {
                            request_id,
                            session_id,
                            agent_id: log.agent_id.unwrap_or_default(),
                            content: log.response_content.unwrap_or_default(),
                        }),
                        WaitOutcome::TimedOut => Ok(ProcessingOutcome::TimedOut {
                            request_id,
                            session_id,
                        }),
                    }
                }
            }
        }
    }

    /// Durable acceptance shared by every mode: bind a session, normalize,
    /// write the request log, bump the counter.
    async fn accept(&self, incoming: &IncomingRequest) -> Result<NormalizedRequest> {
        let existing = database::session::find_active(
            self.db.pool(),
            &incoming.user_id,
            incoming.channel.as_str(),
            incoming.channel_id.as_deref(),
            incoming.thread_id.as_deref(),
        )
        .await?;
        let is_new_session = existing.is_none();

        let session = self
            .sessions
            .find_or_create_session(
                &incoming.user_id,
                incoming.channel.as_str(),
                incoming.channel_id.as_deref(),
                incoming.thread_id.as_deref(),
            )
            .await?;

        if is_new_session {
            self.announce_session(&session.session_id, &session.user_id)
                .await;
        }

        let request = self.normalizer.normalize(incoming, &session.session_id)?;

        request_log::create(
            self.db.pool(),
            &NewRequestLog {
                request_id: request.request_id.clone(),
                session_id: request.session_id.clone(),
                request_type: request.request_type.as_str().to_string(),
                request_content: request.content.clone(),
                normalized_request: serde_json::to_string(&request)?,
                agent_id: request.target_agent_id.clone(),
            },
        )
        .await?;

        self.sessions
            .increment_request_count(&request.session_id, &request.request_id)
            .await;

        info!(
            request_id = %request.request_id,
            session_id = %request.session_id,
            channel = %request.integration_type,
            "Accepted request"
        );

        Ok(request)
    }

    async fn announce_session(&self, session_id: &str, user_id: &str) {
        let Some(publisher) = &self.publisher else {
            return;
        };
        let envelope = EventEnvelope::new(
            event_types::SESSION_CREATED,
            service_sources::REQUEST_MANAGER,
            Some(session_id.to_string()),
            serde_json::json!({ "session_id": session_id, "user_id": user_id }),
        );
        // Lifecycle announcements are best-effort.
        publisher.publish(&envelope).await;
    }

    /// Run one agent turn for an accepted request.
    pub async fn execute_turn(&self, request: &NormalizedRequest) -> Result<AgentResponse> {
        let session = self.sessions.get_session(&request.session_id).await?;

        let agent_id = request
            .target_agent_id
            .clone()
            .or(session.current_agent_id.clone())
            .unwrap_or_else(|| self.registry.default_agent().to_string());

        let handle = match self
            .runtime_cache
            .get(&request.session_id, &agent_id)
            .await
        {
            Some(handle) => Some(handle),
            None => session.runtime_session_id.clone(),
        };

        let turn = self
            .runtime
            .run_turn(&agent_id, handle.as_deref(), &request.content)
            .await?;

        if let Some(new_handle) = &turn.runtime_session_id {
            if handle.as_deref() != Some(new_handle.as_str()) {
                self.runtime_cache
                    .put(&request.session_id, &agent_id, new_handle.clone())
                    .await;
                if let Err(e) = self
                    .sessions
                    .update_session(
                        &request.session_id,
                        SessionUpdate {
                            runtime_session_id: Some(Some(new_handle.clone())),
                            ..Default::default()
                        },
                    )
                    .await
                {
                    warn!(
                        session_id = %request.session_id,
                        error = %e,
                        "Failed to persist runtime session handle"
                    );
                }
            }
        }

        Ok(AgentResponse {
            request_id: request.request_id.clone(),
            session_id: request.session_id.clone(),
            user_id: request.user_id.clone(),
            agent_id,
            content: turn.content,
            response_type: ResponseType::Message,
            metadata: serde_json::Value::Null,
            processing_time_ms: Some(turn.processing_time_ms),
            requires_followup: false,
            followup_actions: Vec::new(),
            created_at: database::now_rfc3339(),
        })
    }

    /// Detached background execution: own task, own failure boundary, own
    /// pool connections. Failures are logged, never surfaced to the caller
    /// that accepted the request.
    fn spawn_background(&self, request: NormalizedRequest) {
        let processor = self.clone_for_background();
        tokio::spawn(async move {
            let request_id = request.request_id.clone();
            match processor.execute_turn(&request).await {
                Ok(response) => {
                    if let Err(e) = processor.response_handler().handle(response).await {
                        error!(request_id = %request_id, error = %e, "Background response handling failed");
                    }
                }
                Err(e) => {
                    error!(request_id = %request_id, error = %e, "Background agent turn failed");
                }
            }
        });
    }

    fn clone_for_background(&self) -> Self {
        Self {
            db: self.db.clone(),
            sessions: self.sessions.clone(),
            normalizer: RequestNormalizer::new(),
            rate_limiter: self.rate_limiter.clone(),
            runtime_cache: self.runtime_cache.clone(),
            registry: self.registry.clone(),
            runtime: self.runtime.clone(),
            strategy: self.strategy.clone(),
            inline_execution: self.inline_execution,
            publisher: self.publisher.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RefreshPolicy, StaticAgentDirectory};
    use crate::response::INTRODUCTION_REQUEST;
    use crate::runtime::testing::ScriptedRuntime;
    use async_trait::async_trait;
    use events::IngressChannel;
    use std::sync::Mutex;

    /// In-process strategy double: records sends and deliveries, waits by
    /// polling the request log like the event-bus strategy does.
    struct RecordingStrategy {
        db: Database,
        sent: Mutex<Vec<NormalizedRequest>>,
        delivered: Mutex<Vec<AgentResponse>>,
    }

    impl RecordingStrategy {
        fn new(db: Database) -> Self {
            Self {
                db,
                sent: Mutex::new(Vec::new()),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommunicationStrategy for RecordingStrategy {
        async fn send_request(&self, request: &NormalizedRequest) -> bool {
            self.sent.lock().unwrap().push(request.clone());
            true
        }

        async fn wait_for_response(
            &self,
            request_id: &str,
            timeout: Duration,
        ) -> WaitOutcome {
            let deadline = tokio::time::Instant::now() + timeout;
            loop {
                if let Ok(log) = request_log::get(self.db.pool(), request_id).await {
                    if log.response_content.is_some() {
                        return WaitOutcome::Completed(log);
                    }
                }
                if tokio::time::Instant::now() >= deadline {
                    return WaitOutcome::TimedOut;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }

        async fn deliver_response(&self, response: &AgentResponse) -> bool {
            self.delivered.lock().unwrap().push(response.clone());
            true
        }
    }

    struct World {
        db: Database,
        processor: RequestProcessor,
        runtime: Arc<ScriptedRuntime>,
        strategy: Arc<RecordingStrategy>,
    }

    async fn world(runtime: ScriptedRuntime, inline_execution: bool) -> World {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();

        let runtime = Arc::new(runtime);
        let strategy = Arc::new(RecordingStrategy::new(db.clone()));
        let registry = Arc::new(AgentRegistry::new(
            Arc::new(StaticAgentDirectory::new(&[
                "router",
                "laptop-refresh",
                "access-request",
            ])),
            RefreshPolicy::RefreshIfEmpty,
            "router".to_string(),
        ));

        let processor = RequestProcessor::new(
            db.clone(),
            SessionManager::new(db.clone()),
            Arc::new(IngressRateLimiter::new(Duration::from_millis(0))),
            Arc::new(RuntimeSessionCache::new(Duration::from_secs(60))),
            registry,
            runtime.clone(),
            strategy.clone(),
            inline_execution,
            None,
        );

        World {
            db,
            processor,
            runtime,
            strategy,
        }
    }

    fn incoming(content: &str) -> IncomingRequest {
        IncomingRequest::message(IngressChannel::Cli, "alice", content)
    }

    #[tokio::test]
    async fn test_sync_inline_runs_default_agent_and_persists() {
        let w = world(
            ScriptedRuntime::new().with_replies("router", &["how can I help?"]),
            true,
        )
        .await;

        let outcome = w
            .processor
            .process(
                incoming("hello"),
                ProcessingMode::Sync {
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();

        let ProcessingOutcome::Completed {
            request_id,
            session_id,
            agent_id,
            content,
        } = outcome
        else {
            panic!("expected completion");
        };
        assert_eq!(agent_id, "router");
        assert_eq!(content, "how can I help?");

        let log = request_log::get(w.db.pool(), &request_id).await.unwrap();
        assert_eq!(log.response_content.as_deref(), Some("how can I help?"));

        let session = database::session::get(w.db.pool(), &session_id)
            .await
            .unwrap();
        assert_eq!(session.total_requests, 1);
        assert_eq!(w.strategy.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_end_to_end_handoff_delivers_introduction() {
        let w = world(
            ScriptedRuntime::new()
                .with_replies("router", &["Sounds like hardware.\nROUTE_TO: laptop-refresh"])
                .with_replies(
                    "laptop-refresh",
                    &["Hi, I handle laptop refreshes. What do you need?"],
                ),
            true,
        )
        .await;

        let outcome = w
            .processor
            .process(
                incoming("I need a new laptop"),
                ProcessingMode::Sync {
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();

        let ProcessingOutcome::Completed {
            request_id,
            session_id,
            agent_id,
            content,
        } = outcome
        else {
            panic!("expected completion");
        };

        // The user sees the target agent's introduction, not the directive.
        assert_eq!(agent_id, "laptop-refresh");
        assert_eq!(content, "Hi, I handle laptop refreshes. What do you need?");
        assert!(!content.contains("ROUTE_TO"));

        let session = database::session::get(w.db.pool(), &session_id)
            .await
            .unwrap();
        assert_eq!(session.current_agent_id.as_deref(), Some("laptop-refresh"));

        let log = request_log::get(w.db.pool(), &request_id).await.unwrap();
        assert_eq!(
            log.response_content.as_deref(),
            Some("Hi, I handle laptop refreshes. What do you need?")
        );

        // The handoff re-issued the introduction request to the new agent.
        let calls = w.runtime.calls_for("laptop-refresh");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].2, INTRODUCTION_REQUEST);
    }

    #[tokio::test]
    async fn test_mode_equivalence_event_vs_direct() {
        // Direct mode, inline execution.
        let direct = world(
            ScriptedRuntime::new()
                .with_replies("router", &["ROUTE_TO: laptop-refresh"])
                .with_replies("laptop-refresh", &["I'm the laptop agent."]),
            true,
        )
        .await;
        let outcome = direct
            .processor
            .process(
                incoming("I need a new laptop"),
                ProcessingMode::Sync {
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();
        let ProcessingOutcome::Completed {
            session_id: direct_session,
            content: direct_content,
            ..
        } = outcome
        else {
            panic!("expected completion");
        };

        // Event mode: accept async, then play the consumer's part.
        let event = world(
            ScriptedRuntime::new()
                .with_replies("router", &["ROUTE_TO: laptop-refresh"])
                .with_replies("laptop-refresh", &["I'm the laptop agent."]),
            false,
        )
        .await;
        let outcome = event
            .processor
            .process(incoming("I need a new laptop"), ProcessingMode::Async)
            .await
            .unwrap();
        let ProcessingOutcome::Accepted {
            request_id: event_request,
            session_id: event_session,
        } = outcome
        else {
            panic!("expected acceptance");
        };

        let sent = event.strategy.sent.lock().unwrap().remove(0);
        let response = event.processor.execute_turn(&sent).await.unwrap();
        event
            .processor
            .response_handler()
            .handle(response)
            .await
            .unwrap();

        // Identical final state through both transports.
        let event_log = request_log::get(event.db.pool(), &event_request)
            .await
            .unwrap();
        assert_eq!(event_log.response_content.as_deref(), Some(direct_content.as_str()));

        let direct_state = database::session::get(direct.db.pool(), &direct_session)
            .await
            .unwrap();
        let event_state = database::session::get(event.db.pool(), &event_session)
            .await
            .unwrap();
        assert_eq!(direct_state.current_agent_id, event_state.current_agent_id);
        assert_eq!(
            event_state.current_agent_id.as_deref(),
            Some("laptop-refresh")
        );
    }

    #[tokio::test]
    async fn test_unknown_routing_target_still_delivers_reply() {
        let w = world(
            ScriptedRuntime::new().with_replies("router", &["ROUTE_TO: espresso-machine"]),
            true,
        )
        .await;

        let outcome = w
            .processor
            .process(
                incoming("fix my coffee"),
                ProcessingMode::Sync {
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();

        let ProcessingOutcome::Completed {
            session_id, content, ..
        } = outcome
        else {
            panic!("expected completion");
        };

        // Routing ignored, response still reaches the user unchanged.
        assert_eq!(content, "ROUTE_TO: espresso-machine");
        let session = database::session::get(w.db.pool(), &session_id)
            .await
            .unwrap();
        assert!(session.current_agent_id.is_none());
        assert_eq!(w.strategy.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_completion_sentinel_returns_session_to_router() {
        let w = world(
            ScriptedRuntime::new()
                .with_replies(
                    "laptop-refresh",
                    &["All done! task_complete_return_to_router"],
                )
                .with_replies("router", &["Back with the router. Anything else?"]),
            true,
        )
        .await;

        // Pre-route the session to laptop-refresh.
        let session = w
            .processor
            .sessions
            .find_or_create_session("alice", "cli", None, None)
            .await
            .unwrap();
        w.processor
            .sessions
            .update_session(
                &session.session_id,
                SessionUpdate {
                    current_agent_id: Some("laptop-refresh".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let outcome = w
            .processor
            .process(
                incoming("that's everything, thanks"),
                ProcessingMode::Sync {
                    timeout: Duration::from_secs(5),
                },
            )
            .await
            .unwrap();

        let ProcessingOutcome::Completed { agent_id, .. } = outcome else {
            panic!("expected completion");
        };
        assert_eq!(agent_id, "router");

        let session = database::session::get(w.db.pool(), &session.session_id)
            .await
            .unwrap();
        assert_eq!(session.current_agent_id.as_deref(), Some("router"));
    }

    #[tokio::test]
    async fn test_rate_limiter_rejects_rapid_fire() {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        let runtime = Arc::new(ScriptedRuntime::new().with_replies("router", &["ok"]));
        let strategy = Arc::new(RecordingStrategy::new(db.clone()));
        let registry = Arc::new(AgentRegistry::new(
            Arc::new(StaticAgentDirectory::new(&["router"])),
            RefreshPolicy::RefreshIfEmpty,
            "router".to_string(),
        ));
        let processor = RequestProcessor::new(
            db.clone(),
            SessionManager::new(db),
            Arc::new(IngressRateLimiter::new(Duration::from_secs(60))),
            Arc::new(RuntimeSessionCache::new(Duration::from_secs(60))),
            registry,
            runtime,
            strategy,
            true,
            None,
        );

        let first = processor
            .process(incoming("hello"), ProcessingMode::Async)
            .await
            .unwrap();
        assert!(matches!(first, ProcessingOutcome::Accepted { .. }));

        let second = processor
            .process(incoming("hello again"), ProcessingMode::Async)
            .await
            .unwrap();
        assert!(matches!(second, ProcessingOutcome::RateLimited));
    }

    #[tokio::test]
    async fn test_background_mode_resolves_after_acceptance() {
        let w = world(
            ScriptedRuntime::new().with_replies("router", &["done in the background"]),
            true,
        )
        .await;

        let outcome = w
            .processor
            .process(incoming("hello"), ProcessingMode::AsyncBackground)
            .await
            .unwrap();
        let ProcessingOutcome::Accepted { request_id, .. } = outcome else {
            panic!("expected acceptance");
        };

        // The caller already returned; the detached task completes the log.
        let mut log = request_log::get(w.db.pool(), &request_id).await.unwrap();
        for _ in 0..100 {
            if log.response_content.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            log = request_log::get(w.db.pool(), &request_id).await.unwrap();
        }
        assert_eq!(
            log.response_content.as_deref(),
            Some("done in the background")
        );
    }
}
