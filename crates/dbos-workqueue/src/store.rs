//! Workflow status persistence.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::debug;

use crate::admission::{admission_budget, rate_window_start};
use crate::error::QueueError;
use crate::queue::Queue;
use crate::workflow::{WorkflowOutcome, WorkflowRecord, WorkflowStatus};

/// Durable record of every workflow's status, queue and owner.
///
/// The store is the only shared mutable state of the scheduler. Callers ask
/// for transitions; they never mutate records they have read.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Insert a record unless its id already exists. Returns whether it was
    /// inserted.
    async fn insert_workflow(&self, record: &WorkflowRecord) -> Result<bool, QueueError>;

    /// Load a record by id.
    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRecord>, QueueError>;

    /// Atomically promote up to the queue's admission budget of `ENQUEUED`
    /// workflows to `PENDING` under `executor_id`, oldest first.
    ///
    /// Concurrent callers against the same store never promote the same
    /// workflow twice.
    async fn start_queued_workflows(
        &self,
        queue: &Queue,
        executor_id: &str,
        now_ms: i64,
    ) -> Result<Vec<String>, QueueError>;

    /// Stamp `executor_id` on a `PENDING` workflow. Returns false when the
    /// workflow is not `PENDING`.
    async fn claim_workflow(&self, id: &str, executor_id: &str) -> Result<bool, QueueError>;

    /// Move a `PENDING` workflow to `SUCCESS` or `ERROR`.
    async fn record_outcome(&self, id: &str, outcome: WorkflowOutcome) -> Result<(), QueueError>;

    /// Ids of `PENDING` workflows owned by any of `executor_ids`, oldest first.
    async fn find_pending_workflows(
        &self,
        executor_ids: &[String],
    ) -> Result<Vec<String>, QueueError>;

    /// Number of workflows of a queue in `status`.
    async fn count_by_status(
        &self,
        queue_name: &str,
        status: WorkflowStatus,
    ) -> Result<usize, QueueError>;
}

/// In-memory workflow store.
///
/// Every operation runs under one exclusive guard, which makes admission
/// atomic across tasks of this process.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    records: Mutex<HashMap<String, WorkflowRecord>>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored workflows.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

pub(crate) fn outcome_status(outcome: &WorkflowOutcome) -> WorkflowStatus {
    match outcome {
        Ok(_) => WorkflowStatus::Success,
        Err(_) => WorkflowStatus::Error,
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn insert_workflow(&self, record: &WorkflowRecord) -> Result<bool, QueueError> {
        let mut records = self.records.lock();
        if records.contains_key(&record.workflow_uuid) {
            return Ok(false);
        }
        records.insert(record.workflow_uuid.clone(), record.clone());
        Ok(true)
    }

    async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRecord>, QueueError> {
        Ok(self.records.lock().get(id).cloned())
    }

    async fn start_queued_workflows(
        &self,
        queue: &Queue,
        executor_id: &str,
        now_ms: i64,
    ) -> Result<Vec<String>, QueueError> {
        let mut records = self.records.lock();
        let in_queue = |r: &&WorkflowRecord| r.queue_name.as_deref() == Some(queue.name());

        let pending = records
            .values()
            .filter(in_queue)
            .filter(|r| r.status == WorkflowStatus::Pending)
            .count();
        let recent_starts = match rate_window_start(queue, now_ms) {
            Some(window_start) => records
                .values()
                .filter(in_queue)
                .filter(|r| r.started_at_ms.is_some_and(|t| t > window_start))
                .count(),
            None => 0,
        };
        let budget = admission_budget(queue, pending, recent_starts);
        if budget == Some(0) {
            return Ok(Vec::new());
        }

        let mut candidates: Vec<(i64, String)> = records
            .values()
            .filter(in_queue)
            .filter(|r| r.status == WorkflowStatus::Enqueued)
            .map(|r| (r.created_at_ms, r.workflow_uuid.clone()))
            .collect();
        candidates.sort();
        if let Some(budget) = budget {
            candidates.truncate(budget);
        }

        let mut started = Vec::with_capacity(candidates.len());
        for (_, id) in candidates {
            if let Some(record) = records.get_mut(&id) {
                record.status = WorkflowStatus::Pending;
                record.executor_id = Some(executor_id.to_string());
                record.started_at_ms = Some(now_ms);
                record.updated_at_ms = now_ms;
                started.push(id);
            }
        }
        Ok(started)
    }

    async fn claim_workflow(&self, id: &str, executor_id: &str) -> Result<bool, QueueError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| QueueError::WorkflowNotFound(id.to_string()))?;

        if record.status != WorkflowStatus::Pending {
            return Ok(false);
        }
        record.executor_id = Some(executor_id.to_string());
        record.updated_at_ms = Utc::now().timestamp_millis();
        Ok(true)
    }

    async fn record_outcome(&self, id: &str, outcome: WorkflowOutcome) -> Result<(), QueueError> {
        let mut records = self.records.lock();
        let record = records
            .get_mut(id)
            .ok_or_else(|| QueueError::WorkflowNotFound(id.to_string()))?;

        let next = outcome_status(&outcome);
        if !record.status.can_transition_to(next) {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: record.status,
                to: next,
            });
        }

        record.status = next;
        match outcome {
            Ok(output) => record.output = Some(output),
            Err(error) => record.error = Some(error),
        }
        record.updated_at_ms = Utc::now().timestamp_millis();
        debug!("Workflow {} finished with status {}", id, next);
        Ok(())
    }

    async fn find_pending_workflows(
        &self,
        executor_ids: &[String],
    ) -> Result<Vec<String>, QueueError> {
        let records = self.records.lock();
        let mut matched: Vec<(i64, String)> = records
            .values()
            .filter(|r| r.status == WorkflowStatus::Pending)
            .filter(|r| {
                r.executor_id
                    .as_ref()
                    .is_some_and(|owner| executor_ids.contains(owner))
            })
            .map(|r| (r.created_at_ms, r.workflow_uuid.clone()))
            .collect();
        matched.sort();
        Ok(matched.into_iter().map(|(_, id)| id).collect())
    }

    async fn count_by_status(
        &self,
        queue_name: &str,
        status: WorkflowStatus,
    ) -> Result<usize, QueueError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.queue_name.as_deref() == Some(queue_name) && r.status == status)
            .count())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
