//! Detection of routing signals in agent output.

use tracing::{debug, warn};

use crate::registry::AgentRegistry;

/// Control token an agent emits when its task is done and control should
/// return to the default router agent.
pub const COMPLETION_SENTINEL: &str = "task_complete_return_to_router";

/// Prefix of the explicit handoff directive line.
pub const ROUTE_DIRECTIVE: &str = "ROUTE_TO:";

/// Detects routing signals in free-text agent output.
///
/// Two grammars are accepted, and they cannot disagree: a `ROUTE_TO:`
/// directive line is canonical and always decides when present; a bare agent
/// name is only honored when it is the entire trimmed message, which by
/// construction contains no directive.
pub struct RoutingDetector;

impl RoutingDetector {
    /// Inspect agent output for a routing signal.
    ///
    /// Returns the agent to hand off to, or `None` for a plain
    /// conversational reply (the common case). Targets naming the current
    /// agent are a no-op; targets absent from the registry are ignored with
    /// a warning, never a failure.
    pub async fn detect(
        response_text: &str,
        responding_agent: &str,
        current_agent: Option<&str>,
        registry: &AgentRegistry,
    ) -> Option<String> {
        // Signal 1: completion sentinel anywhere in the text always returns
        // control to the default agent, regardless of which agent spoke.
        if response_text.contains(COMPLETION_SENTINEL) {
            debug!(
                responding_agent = %responding_agent,
                "Completion sentinel detected, returning to default agent"
            );
            return Some(registry.default_agent().to_string());
        }

        // Signal 2: explicit handoff directive, or a whole-message bare name.
        let candidate = Self::directive_target(response_text)
            .or_else(|| Self::bare_name_target(response_text));

        let Some(candidate) = candidate else {
            debug!(responding_agent = %responding_agent, "No routing signal");
            return None;
        };

        if current_agent.is_some_and(|cur| cur.eq_ignore_ascii_case(&candidate))
            || registry.default_agent().eq_ignore_ascii_case(&candidate)
                && current_agent.is_none()
        {
            debug!(target = %candidate, "Routing target is already active, no-op");
            return None;
        }

        if !registry.contains(&candidate).await {
            warn!(
                target = %candidate,
                responding_agent = %responding_agent,
                "Routing target not in agent registry, ignoring"
            );
            return None;
        }

        Some(Self::canonical_name(&candidate, registry).await)
    }

    /// First `ROUTE_TO:` line, if any.
    fn directive_target(text: &str) -> Option<String> {
        text.lines().find_map(|line| {
            let line = line.trim();
            line.strip_prefix(ROUTE_DIRECTIVE)
                .map(|rest| rest.trim().to_string())
                .filter(|t| !t.is_empty())
        })
    }

    /// A bare agent name is only a signal when it is the entire message.
    fn bare_name_target(text: &str) -> Option<String> {
        let trimmed = text.trim();
        let looks_like_name = !trimmed.is_empty()
            && !trimmed.contains(char::is_whitespace)
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        looks_like_name.then(|| trimmed.to_string())
    }

    /// Resolve the registry's spelling of a case-insensitive match.
    async fn canonical_name(candidate: &str, registry: &AgentRegistry) -> String {
        registry
            .agents()
            .await
            .into_iter()
            .find(|a| a.eq_ignore_ascii_case(candidate))
            .unwrap_or_else(|| candidate.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{RefreshPolicy, StaticAgentDirectory};
    use std::sync::Arc;

    fn registry() -> AgentRegistry {
        AgentRegistry::new(
            Arc::new(StaticAgentDirectory::new(&[
                "router",
                "laptop-refresh",
                "access-request",
            ])),
            RefreshPolicy::RefreshIfEmpty,
            "router".to_string(),
        )
    }

    #[tokio::test]
    async fn test_sentinel_always_routes_to_default() {
        let reg = registry();

        let target = RoutingDetector::detect(
            format!("all done! {COMPLETION_SENTINEL}").as_str(),
            "laptop-refresh",
            Some("laptop-refresh"),
            &reg,
        )
        .await;
        assert_eq!(target.as_deref(), Some("router"));

        // Regardless of sender.
        let target =
            RoutingDetector::detect(COMPLETION_SENTINEL, "access-request", None, &reg).await;
        assert_eq!(target.as_deref(), Some("router"));
    }

    #[tokio::test]
    async fn test_directive_routes_to_named_agent() {
        let reg = registry();

        let target = RoutingDetector::detect(
            "Sounds like hardware.\nROUTE_TO: laptop-refresh",
            "router",
            None,
            &reg,
        )
        .await;
        assert_eq!(target.as_deref(), Some("laptop-refresh"));
    }

    #[tokio::test]
    async fn test_directive_is_case_insensitive_on_agent_name() {
        let reg = registry();

        let target =
            RoutingDetector::detect("ROUTE_TO: Laptop-Refresh", "router", None, &reg).await;
        assert_eq!(target.as_deref(), Some("laptop-refresh"));
    }

    #[tokio::test]
    async fn test_bare_name_must_be_whole_message() {
        let reg = registry();

        let target = RoutingDetector::detect("laptop-refresh", "router", None, &reg).await;
        assert_eq!(target.as_deref(), Some("laptop-refresh"));

        // Mentioning an agent mid-sentence is conversation, not routing.
        let target = RoutingDetector::detect(
            "you should ask laptop-refresh about that",
            "router",
            None,
            &reg,
        )
        .await;
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_directive_wins_over_bare_name() {
        let reg = registry();

        // A message that is both a directive and mentions agents elsewhere:
        // the directive path decides.
        let target = RoutingDetector::detect(
            "ROUTE_TO: access-request\nlaptop-refresh",
            "router",
            None,
            &reg,
        )
        .await;
        assert_eq!(target.as_deref(), Some("access-request"));
    }

    #[tokio::test]
    async fn test_unknown_target_is_ignored() {
        let reg = registry();

        let target =
            RoutingDetector::detect("ROUTE_TO: espresso-machine", "router", None, &reg).await;
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_current_agent_target_is_noop() {
        let reg = registry();

        let target = RoutingDetector::detect(
            "ROUTE_TO: laptop-refresh",
            "laptop-refresh",
            Some("laptop-refresh"),
            &reg,
        )
        .await;
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_default_agent_target_with_no_current_is_noop() {
        let reg = registry();

        let target = RoutingDetector::detect("ROUTE_TO: router", "router", None, &reg).await;
        assert!(target.is_none());
    }

    #[tokio::test]
    async fn test_plain_reply_is_no_signal() {
        let reg = registry();

        let target = RoutingDetector::detect(
            "Sure, I can help you request a new laptop. What model?",
            "laptop-refresh",
            Some("laptop-refresh"),
            &reg,
        )
        .await;
        assert!(target.is_none());
    }
}
