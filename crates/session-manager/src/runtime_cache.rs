//! Best-effort cache of agent-runtime conversation handles.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Entry {
    handle: String,
    cached_at: Instant,
}

/// Caches runtime conversation handles keyed by (session, agent).
///
/// Best-effort: a miss (or an invalidated handle) just means the caller
/// opens a fresh runtime conversation. Entries expire so memory stays
/// bounded when sessions go quiet.
pub struct RuntimeSessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<(String, String), Entry>>,
}

impl RuntimeSessionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get(&self, session_id: &str, agent_id: &str) -> Option<String> {
        let key = (session_id.to_string(), agent_id.to_string());
        let entries = self.entries.read().await;
        entries
            .get(&key)
            .filter(|e| e.cached_at.elapsed() < self.ttl)
            .map(|e| e.handle.clone())
    }

    pub async fn put(&self, session_id: &str, agent_id: &str, handle: String) {
        let key = (session_id.to_string(), agent_id.to_string());
        self.entries.write().await.insert(
            key,
            Entry {
                handle,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop one handle, e.g. after the runtime reports it unknown.
    pub async fn invalidate(&self, session_id: &str, agent_id: &str) {
        let key = (session_id.to_string(), agent_id.to_string());
        self.entries.write().await.remove(&key);
    }

    /// Drop every handle for a session. Used on agent handoff, where the new
    /// agent needs a fresh runtime conversation.
    pub async fn invalidate_session(&self, session_id: &str) {
        self.entries
            .write()
            .await
            .retain(|(sid, _), _| sid != session_id);
    }

    /// Remove expired entries.
    pub async fn prune(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .await
            .retain(|_, e| e.cached_at.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> RuntimeSessionCache {
        RuntimeSessionCache::new(Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_put_get_invalidate() {
        let cache = cache();

        cache.put("sess-1", "router", "rt-1".to_string()).await;
        assert_eq!(cache.get("sess-1", "router").await.as_deref(), Some("rt-1"));

        cache.invalidate("sess-1", "router").await;
        assert!(cache.get("sess-1", "router").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_session_clears_all_agents() {
        let cache = cache();

        cache.put("sess-1", "router", "rt-1".to_string()).await;
        cache.put("sess-1", "laptop-refresh", "rt-2".to_string()).await;
        cache.put("sess-2", "router", "rt-3".to_string()).await;

        cache.invalidate_session("sess-1").await;

        assert!(cache.get("sess-1", "router").await.is_none());
        assert!(cache.get("sess-1", "laptop-refresh").await.is_none());
        assert_eq!(cache.get("sess-2", "router").await.as_deref(), Some("rt-3"));
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses_and_pruned() {
        let cache = RuntimeSessionCache::new(Duration::from_millis(10));

        cache.put("sess-1", "router", "rt-1".to_string()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(cache.get("sess-1", "router").await.is_none());

        cache.prune().await;
        assert!(cache.entries.read().await.is_empty());
    }
}
