//! Queue errors.

use thiserror::Error;

use crate::workflow::WorkflowStatus;

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue definition rejected at construction.
    #[error("Invalid queue '{name}': {reason}")]
    InvalidQueue { name: String, reason: String },

    /// Queue name already registered.
    #[error("Queue already registered: {0}")]
    DuplicateQueue(String),

    /// Queue not registered.
    #[error("Queue not found: {0}")]
    QueueNotFound(String),

    /// Workflow not found in the store.
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    /// No workflow function registered under this name.
    #[error("Workflow function not registered: {0}")]
    FunctionNotRegistered(String),

    /// Workflow function name already registered.
    #[error("Workflow function already registered: {0}")]
    DuplicateFunction(String),

    /// Status change not allowed by the workflow lifecycle.
    #[error("Workflow {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: WorkflowStatus,
        to: WorkflowStatus,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Execution trigger failed to submit a workflow.
    #[error("Trigger error: {0}")]
    Trigger(String),
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            // Errors raised inside a connection closure travel boxed.
            tokio_rusqlite::Error::Other(inner) => match inner.downcast::<QueueError>() {
                Ok(queue_err) => *queue_err,
                Err(other) => QueueError::Database(other.to_string()),
            },
            other => QueueError::Database(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        QueueError::Database(err.to_string())
    }
}
