//! Workflow execution.
//!
//! The scheduler never runs workflow bodies itself. It hands ids to an
//! [`ExecutionTrigger`], which must tolerate being called more than once for
//! the same id.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::error::QueueError;
use crate::store::WorkflowStore;
use crate::workflow::WorkflowOutcome;

/// Starts execution of a workflow by id.
#[async_trait]
pub trait ExecutionTrigger: Send + Sync {
    /// Submit `workflow_id` for execution. Returns once submitted, not when
    /// the workflow finishes.
    async fn trigger(&self, workflow_id: &str) -> Result<(), QueueError>;
}

/// What a running workflow knows about itself.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub workflow_id: String,
    pub name: String,
    pub executor_id: String,
}

/// A registered workflow body.
#[async_trait]
pub trait WorkflowFunction: Send + Sync {
    fn name(&self) -> &str;

    async fn invoke(&self, ctx: WorkflowContext, input: Value) -> WorkflowOutcome;
}

/// Workflow function backed by an async closure.
pub struct FnWorkflow<F> {
    name: String,
    func: F,
}

impl<F, Fut> FnWorkflow<F>
where
    F: Fn(WorkflowContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkflowOutcome> + Send + 'static,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> WorkflowFunction for FnWorkflow<F>
where
    F: Fn(WorkflowContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = WorkflowOutcome> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn invoke(&self, ctx: WorkflowContext, input: Value) -> WorkflowOutcome {
        (self.func)(ctx, input).await
    }
}

/// Workflow functions by name.
#[derive(Default)]
pub struct WorkflowFunctionRegistry {
    functions: DashMap<String, Arc<dyn WorkflowFunction>>,
}

impl WorkflowFunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function. Names are unique.
    pub fn register(&self, function: Arc<dyn WorkflowFunction>) -> Result<(), QueueError> {
        use dashmap::mapref::entry::Entry;

        let name = function.name().to_string();
        match self.functions.entry(name) {
            Entry::Occupied(entry) => Err(QueueError::DuplicateFunction(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!("Registered workflow function: {}", entry.key());
                entry.insert(function);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn WorkflowFunction>> {
        self.functions.get(name).map(|f| f.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

/// Releases an in-flight slot when execution ends, however it ends.
struct InFlightGuard {
    set: Arc<DashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Runs workflows from a [`WorkflowFunctionRegistry`] on the tokio runtime.
///
/// A trigger claims the workflow for this executor, spawns the body and
/// records its outcome. Ids already running in this process and workflows
/// already finished are skipped.
pub struct RegistryTrigger {
    store: Arc<dyn WorkflowStore>,
    functions: Arc<WorkflowFunctionRegistry>,
    executor_id: String,
    in_flight: Arc<DashSet<String>>,
}

impl RegistryTrigger {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        functions: Arc<WorkflowFunctionRegistry>,
        executor_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            functions,
            executor_id: executor_id.into(),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn executor_id(&self) -> &str {
        &self.executor_id
    }

    /// Number of workflows currently executing in this process.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

#[async_trait]
impl ExecutionTrigger for RegistryTrigger {
    async fn trigger(&self, workflow_id: &str) -> Result<(), QueueError> {
        if !self.in_flight.insert(workflow_id.to_string()) {
            debug!("Workflow {} already running, skipping", workflow_id);
            return Ok(());
        }
        let guard = InFlightGuard {
            set: self.in_flight.clone(),
            id: workflow_id.to_string(),
        };

        let record = self
            .store
            .get_workflow(workflow_id)
            .await?
            .ok_or_else(|| QueueError::WorkflowNotFound(workflow_id.to_string()))?;

        if record.status.is_terminal() {
            debug!("Workflow {} already {}, skipping", workflow_id, record.status);
            return Ok(());
        }

        let function = self
            .functions
            .get(&record.name)
            .ok_or_else(|| QueueError::FunctionNotRegistered(record.name.clone()))?;

        if !self.store.claim_workflow(workflow_id, &self.executor_id).await? {
            warn!(
                "Workflow {} is {} and cannot be started",
                workflow_id, record.status
            );
            return Ok(());
        }

        let ctx = WorkflowContext {
            workflow_id: record.workflow_uuid.clone(),
            name: record.name.clone(),
            executor_id: self.executor_id.clone(),
        };
        let store = self.store.clone();
        info!("Starting workflow {} ({})", ctx.workflow_id, ctx.name);

        tokio::spawn(async move {
            let _guard = guard;
            let id = ctx.workflow_id.clone();
            let outcome = function.invoke(ctx, record.inputs).await;

            if let Err(e) = &outcome {
                warn!("Workflow {} failed: {}", id, e);
            }
            if let Err(e) = store.record_outcome(&id, outcome).await {
                error!("Failed to record outcome of workflow {}: {}", id, e);
            }
        });

        Ok(())
    }
}
