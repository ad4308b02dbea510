//! Queue admission.
//!
//! Decides how many `ENQUEUED` workflows of a queue may become `PENDING` on
//! this tick. The budget arithmetic lives here; the store applies it inside
//! its own atomic section so concurrent executors never double-promote.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::error::QueueError;
use crate::queue::Queue;
use crate::store::WorkflowStore;

/// Number of workflows that may be promoted now, or `None` when unbounded.
///
/// `pending` is the queue's current `PENDING` count across all executors and
/// `recent_starts` the promotions inside the trailing rate-limit window. When
/// both limits apply the tighter one wins.
pub fn admission_budget(queue: &Queue, pending: usize, recent_starts: usize) -> Option<usize> {
    let by_concurrency = queue
        .concurrency()
        .map(|max| (max as usize).saturating_sub(pending));
    let by_rate = queue
        .limiter()
        .map(|limiter| (limiter.limit as usize).saturating_sub(recent_starts));

    match (by_concurrency, by_rate) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Start of the trailing rate-limit window at `now_ms`. A start counts when
/// it happened strictly after this instant.
pub fn rate_window_start(queue: &Queue, now_ms: i64) -> Option<i64> {
    queue.limiter().map(|limiter| now_ms - limiter.period_ms())
}

/// Promotes queued workflows for one executor.
pub struct AdmissionEngine {
    store: Arc<dyn WorkflowStore>,
    executor_id: String,
}

impl AdmissionEngine {
    pub fn new(store: Arc<dyn WorkflowStore>, executor_id: impl Into<String>) -> Self {
        Self {
            store,
            executor_id: executor_id.into(),
        }
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    /// Promote what `queue` allows right now. Returns the promoted ids.
    pub async fn admit(&self, queue: &Queue) -> Result<Vec<String>, QueueError> {
        self.admit_at(queue, Utc::now().timestamp_millis()).await
    }

    /// Promote as of `now_ms`.
    pub async fn admit_at(&self, queue: &Queue, now_ms: i64) -> Result<Vec<String>, QueueError> {
        let ids = self
            .store
            .start_queued_workflows(queue, &self.executor_id, now_ms)
            .await?;

        if !ids.is_empty() {
            debug!(
                "Executor {} admitted {} workflow(s) from queue '{}'",
                self.executor_id,
                ids.len(),
                queue.name()
            );
        }
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "admission_tests.rs"]
mod tests;
