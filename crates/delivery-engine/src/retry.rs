//! Retry scheduling seam.
//!
//! The engine decides *whether* a retry is warranted and keeps the books;
//! actually executing it later belongs to an external task runner behind
//! this trait.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

/// Schedules a future re-attempt of one delivery log entry.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    async fn schedule_retry(&self, delivery_log_id: i64, delay: Duration);
}

/// Default scheduler: records the decision in the log and nothing else.
/// Deployments wire in a real task runner; the sweep over retryable rows
/// picks the entry up either way.
#[derive(Debug, Clone, Default)]
pub struct LoggingRetryScheduler;

#[async_trait]
impl RetryScheduler for LoggingRetryScheduler {
    async fn schedule_retry(&self, delivery_log_id: i64, delay: Duration) {
        info!(
            delivery_log_id,
            delay_secs = delay.as_secs(),
            "Retry scheduled"
        );
    }
}
