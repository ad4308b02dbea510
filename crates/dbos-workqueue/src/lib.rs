//! # DBOS Work Queue
//!
//! Scheduling core of the durable workflow engine.
//!
//! ## Features
//!
//! - Named queues with concurrency and rate limits
//! - Admission of `ENQUEUED` workflows with exactly-once claim semantics
//! - Background dispatcher that starts admitted workflows every tick
//! - Recovery of workflows left `PENDING` by dead executors
//! - Workflow status persistence (memory or SQLite)

pub mod admission;
pub mod dispatcher;
pub mod error;
pub mod queue;
pub mod recovery;
pub mod registry;
pub mod runtime;
pub mod sqlite;
pub mod store;
pub mod trigger;
pub mod workflow;

mod schema;

pub use admission::{admission_budget, AdmissionEngine};
pub use dispatcher::{DispatcherState, QueueDispatcher, TickReport};
pub use error::QueueError;
pub use queue::{Queue, RateLimit};
pub use recovery::RecoveryCoordinator;
pub use registry::QueueRegistry;
pub use runtime::WorkflowRuntime;
pub use sqlite::SqliteWorkflowStore;
pub use store::{MemoryWorkflowStore, WorkflowStore};
pub use trigger::{
    ExecutionTrigger, FnWorkflow, RegistryTrigger, WorkflowContext, WorkflowFunction,
    WorkflowFunctionRegistry,
};
pub use workflow::{WorkflowOutcome, WorkflowRecord, WorkflowStatus};
