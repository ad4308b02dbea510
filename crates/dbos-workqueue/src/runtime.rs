//! Workflow runtime.
//!
//! Wires one executor's store, queue registry, function registry, dispatcher
//! and recovery coordinator together.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use dbos_config::{Config, ExecutorConfig};

use crate::admission::AdmissionEngine;
use crate::dispatcher::{DispatcherState, QueueDispatcher, DEFAULT_TICK_INTERVAL};
use crate::error::QueueError;
use crate::queue::Queue;
use crate::recovery::RecoveryCoordinator;
use crate::registry::QueueRegistry;
use crate::sqlite::SqliteWorkflowStore;
use crate::store::WorkflowStore;
use crate::trigger::{ExecutionTrigger, RegistryTrigger, WorkflowFunction, WorkflowFunctionRegistry};
use crate::workflow::WorkflowRecord;

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;

/// One executor of durable workflows.
pub struct WorkflowRuntime {
    executor: ExecutorConfig,
    store: Arc<dyn WorkflowStore>,
    queues: Arc<QueueRegistry>,
    functions: Arc<WorkflowFunctionRegistry>,
    trigger: Arc<dyn ExecutionTrigger>,
    dispatcher: Arc<QueueDispatcher>,
    recovery: Arc<RecoveryCoordinator>,
}

impl WorkflowRuntime {
    /// Create a runtime over `store` with no queues and the default tick.
    pub fn new(executor: ExecutorConfig, store: Arc<dyn WorkflowStore>) -> Self {
        Self::build(
            executor,
            store,
            Arc::new(QueueRegistry::new()),
            Arc::new(WorkflowFunctionRegistry::new()),
            DEFAULT_TICK_INTERVAL,
        )
    }

    /// Create a runtime from configuration: opens the SQLite store (in memory
    /// when no path is set) and registers the declared queues.
    pub async fn from_config(config: &Config) -> Result<Self, QueueError> {
        let store: Arc<dyn WorkflowStore> = match config.database.resolved_path() {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        QueueError::Database(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
                let timeout = Duration::from_millis(config.database.busy_timeout_ms);
                Arc::new(SqliteWorkflowStore::open(&path, timeout).await?)
            }
            None => Arc::new(SqliteWorkflowStore::in_memory().await?),
        };

        let queues = Arc::new(QueueRegistry::from_configs(&config.queues)?);
        Ok(Self::build(
            config.executor.clone(),
            store,
            queues,
            Arc::new(WorkflowFunctionRegistry::new()),
            Duration::from_millis(config.dispatcher.tick_interval_ms),
        ))
    }

    fn build(
        executor: ExecutorConfig,
        store: Arc<dyn WorkflowStore>,
        queues: Arc<QueueRegistry>,
        functions: Arc<WorkflowFunctionRegistry>,
        tick_interval: Duration,
    ) -> Self {
        let trigger: Arc<dyn ExecutionTrigger> = Arc::new(RegistryTrigger::new(
            store.clone(),
            functions.clone(),
            executor.executor_id.clone(),
        ));
        let engine = AdmissionEngine::new(store.clone(), executor.executor_id.clone());
        let dispatcher = Arc::new(
            QueueDispatcher::new(queues.clone(), engine, trigger.clone())
                .with_tick_interval(tick_interval),
        );
        let recovery = Arc::new(RecoveryCoordinator::new(store.clone(), trigger.clone()));

        Self {
            executor,
            store,
            queues,
            functions,
            trigger,
            dispatcher,
            recovery,
        }
    }

    /// Replace the dispatcher tick interval. Call before [`launch`](Self::launch);
    /// a launched runtime keeps its current dispatcher.
    pub fn with_tick_interval(self, interval: Duration) -> Self {
        let state = self.dispatcher.state();
        if state != DispatcherState::Stopped {
            warn!(
                "Ignoring tick interval change on executor {}: dispatcher is {:?}",
                self.executor.executor_id, state
            );
            return self;
        }
        Self::build(self.executor, self.store, self.queues, self.functions, interval)
    }

    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }

    pub fn store(&self) -> Arc<dyn WorkflowStore> {
        self.store.clone()
    }

    pub fn queues(&self) -> Arc<QueueRegistry> {
        self.queues.clone()
    }

    pub fn recovery(&self) -> Arc<RecoveryCoordinator> {
        self.recovery.clone()
    }

    pub fn dispatcher(&self) -> Arc<QueueDispatcher> {
        self.dispatcher.clone()
    }

    pub fn register_queue(&self, queue: Queue) -> Result<Arc<Queue>, QueueError> {
        self.queues.register(queue)
    }

    pub fn register_workflow(&self, function: Arc<dyn WorkflowFunction>) -> Result<(), QueueError> {
        self.functions.register(function)
    }

    /// Whether any workflow function is registered on this executor.
    pub fn hosts_workflows(&self) -> bool {
        !self.functions.is_empty()
    }

    /// Start a workflow now, outside any queue.
    ///
    /// Returns the workflow id. Starting an id that already exists does
    /// nothing and returns the same id.
    pub async fn start_workflow(
        &self,
        name: &str,
        input: Value,
        workflow_id: Option<String>,
    ) -> Result<String, QueueError> {
        if !self.functions.contains(name) {
            return Err(QueueError::FunctionNotRegistered(name.to_string()));
        }

        let record = WorkflowRecord::started(workflow_id, name, input, &self.executor);
        let id = record.workflow_uuid.clone();
        if !self.store.insert_workflow(&record).await? {
            debug!("Workflow {} already exists", id);
            return Ok(id);
        }

        self.trigger.trigger(&id).await?;
        Ok(id)
    }

    /// Enqueue a workflow on a registered queue.
    ///
    /// Returns the workflow id. Enqueuing an id that already exists does
    /// nothing and returns the same id.
    pub async fn enqueue(
        &self,
        queue_name: &str,
        name: &str,
        input: Value,
        workflow_id: Option<String>,
    ) -> Result<String, QueueError> {
        if !self.queues.contains(queue_name) {
            return Err(QueueError::QueueNotFound(queue_name.to_string()));
        }
        if !self.functions.contains(name) {
            return Err(QueueError::FunctionNotRegistered(name.to_string()));
        }

        let mut record = WorkflowRecord::enqueued(workflow_id, name, queue_name, input);
        record.app_id = Some(self.executor.app_id.clone()).filter(|s| !s.is_empty());
        record.app_version = Some(self.executor.app_version.clone()).filter(|s| !s.is_empty());

        let id = record.workflow_uuid.clone();
        if self.store.insert_workflow(&record).await? {
            debug!("Enqueued workflow {} on queue '{}'", id, queue_name);
        } else {
            debug!("Workflow {} already exists", id);
        }
        Ok(id)
    }

    /// Start the dispatcher loop. Returns false if it is already running.
    ///
    /// An executor with no registered workflow functions never dispatches:
    /// anything it admitted would stay `PENDING` under its id with nothing
    /// to run it.
    pub fn launch(&self) -> bool {
        if !self.hosts_workflows() {
            warn!(
                "Executor {} hosts no workflow functions, dispatcher not started",
                self.executor.executor_id
            );
            return false;
        }
        let started = self.dispatcher.start();
        if started {
            info!(
                "Executor {} launched with {} queue(s)",
                self.executor.executor_id,
                self.queues.len()
            );
        }
        started
    }

    /// Stop the dispatcher loop and wait for it to exit. Workflows already
    /// running keep running.
    pub async fn shutdown(&self) {
        self.dispatcher.shutdown().await;
    }

    pub fn dispatcher_state(&self) -> DispatcherState {
        self.dispatcher.state()
    }

    /// Re-trigger `PENDING` workflows owned by `executor_ids`.
    pub async fn recover(&self, executor_ids: &[String]) -> Result<Vec<String>, QueueError> {
        self.recovery.recover(executor_ids).await
    }

    pub async fn get_workflow(&self, id: &str) -> Result<Option<WorkflowRecord>, QueueError> {
        self.store.get_workflow(id).await
    }
}
