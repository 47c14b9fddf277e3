//! Advisory ingress rate limiter.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

/// Minimum-interval limiter per (user, channel).
///
/// A last-seen-timestamp check that absorbs duplicate rapid-fire submissions
/// at ingress. Process-local and advisory only; correctness comes from the
/// dedup ledger, not from this.
pub struct IngressRateLimiter {
    min_interval: Duration,
    last_seen: RwLock<HashMap<(String, String), Instant>>,
}

impl IngressRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_seen: RwLock::new(HashMap::new()),
        }
    }

    /// Record an arrival and report whether it should be admitted.
    pub async fn check(&self, user_id: &str, channel: &str) -> bool {
        let key = (user_id.to_string(), channel.to_string());
        let now = Instant::now();

        let mut last_seen = self.last_seen.write().await;
        match last_seen.get(&key) {
            Some(prev) if now.duration_since(*prev) < self.min_interval => {
                debug!(user_id = %user_id, channel = %channel, "Rate limited");
                false
            }
            _ => {
                last_seen.insert(key, now);
                true
            }
        }
    }

    /// Drop entries older than the interval to bound memory.
    pub async fn prune(&self) {
        let now = Instant::now();
        let min_interval = self.min_interval;
        self.last_seen
            .write()
            .await
            .retain(|_, seen| now.duration_since(*seen) < min_interval);
    }
}
