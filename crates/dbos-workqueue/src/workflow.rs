//! Workflow status record and lifecycle.

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dbos_config::ExecutorConfig;

/// Workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    /// Admitted to a queue, not yet started.
    Enqueued,
    /// Claimed by an executor and running.
    Pending,
    /// Completed with an output.
    Success,
    /// Completed with an error.
    Error,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Enqueued => "ENQUEUED",
            WorkflowStatus::Pending => "PENDING",
            WorkflowStatus::Success => "SUCCESS",
            WorkflowStatus::Error => "ERROR",
        }
    }

    /// `SUCCESS` and `ERROR` are final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowStatus::Success | WorkflowStatus::Error)
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `PENDING -> PENDING` is the reassignment performed when a recovered
    /// workflow is claimed by a new executor.
    pub fn can_transition_to(&self, next: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (self, next),
            (Enqueued, Pending) | (Pending, Pending) | (Pending, Success) | (Pending, Error)
        )
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENQUEUED" => Ok(WorkflowStatus::Enqueued),
            "PENDING" => Ok(WorkflowStatus::Pending),
            "SUCCESS" => Ok(WorkflowStatus::Success),
            "ERROR" => Ok(WorkflowStatus::Error),
            other => Err(format!("unknown workflow status '{}'", other)),
        }
    }
}

/// Result of running a workflow body.
pub type WorkflowOutcome = Result<serde_json::Value, String>;

/// One durable workflow status record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRecord {
    pub workflow_uuid: String,
    pub status: WorkflowStatus,
    /// Registered function to run.
    pub name: String,
    /// `None` runs immediately without admission control.
    pub queue_name: Option<String>,
    pub inputs: serde_json::Value,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Owner while `PENDING`.
    pub executor_id: Option<String>,
    pub app_id: Option<String>,
    pub app_version: Option<String>,
    /// Enqueue time, the FIFO key.
    pub created_at_ms: i64,
    /// Last promotion to `PENDING`.
    pub started_at_ms: Option<i64>,
    pub updated_at_ms: i64,
}

impl WorkflowRecord {
    /// Create a new record. A missing id is generated.
    pub fn new(
        workflow_uuid: Option<String>,
        name: impl Into<String>,
        inputs: serde_json::Value,
        status: WorkflowStatus,
    ) -> Self {
        let now = Utc::now().timestamp_millis();
        Self {
            workflow_uuid: workflow_uuid.unwrap_or_else(|| Uuid::new_v4().to_string()),
            status,
            name: name.into(),
            queue_name: None,
            inputs,
            output: None,
            error: None,
            executor_id: None,
            app_id: None,
            app_version: None,
            created_at_ms: now,
            started_at_ms: None,
            updated_at_ms: now,
        }
    }

    /// Record destined for a queue.
    pub fn enqueued(
        workflow_uuid: Option<String>,
        name: impl Into<String>,
        queue_name: impl Into<String>,
        inputs: serde_json::Value,
    ) -> Self {
        let mut record = Self::new(workflow_uuid, name, inputs, WorkflowStatus::Enqueued);
        record.queue_name = Some(queue_name.into());
        record
    }

    /// Record started immediately by `executor`.
    pub fn started(
        workflow_uuid: Option<String>,
        name: impl Into<String>,
        inputs: serde_json::Value,
        executor: &ExecutorConfig,
    ) -> Self {
        let mut record = Self::new(workflow_uuid, name, inputs, WorkflowStatus::Pending);
        record.started_at_ms = Some(record.created_at_ms);
        record.with_identity(executor)
    }

    /// Stamp executor and application provenance.
    pub fn with_identity(mut self, executor: &ExecutorConfig) -> Self {
        self.executor_id = Some(executor.executor_id.clone());
        self.app_id = non_empty(&executor.app_id);
        self.app_version = non_empty(&executor.app_version);
        self
    }

    /// Override the enqueue time.
    pub fn with_created_at(mut self, created_at_ms: i64) -> Self {
        self.created_at_ms = created_at_ms;
        self.updated_at_ms = created_at_ms;
        self
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
