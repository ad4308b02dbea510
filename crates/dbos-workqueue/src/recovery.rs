//! Recovery of workflows left `PENDING` by executors that went away.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info};

use crate::error::QueueError;
use crate::store::WorkflowStore;
use crate::trigger::ExecutionTrigger;

/// Re-triggers `PENDING` workflows owned by a set of executors.
pub struct RecoveryCoordinator {
    store: Arc<dyn WorkflowStore>,
    trigger: Arc<dyn ExecutionTrigger>,
}

impl RecoveryCoordinator {
    pub fn new(store: Arc<dyn WorkflowStore>, trigger: Arc<dyn ExecutionTrigger>) -> Self {
        Self { store, trigger }
    }

    /// Find every `PENDING` workflow owned by one of `executor_ids` and hand
    /// it to the trigger.
    ///
    /// Returns the ids found, whether or not each trigger succeeded. A
    /// failure to query the store is returned as an error.
    pub async fn recover(&self, executor_ids: &[String]) -> Result<Vec<String>, QueueError> {
        if executor_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = self.store.find_pending_workflows(executor_ids).await?;
        info!(
            "Recovering {} workflow(s) for executors {:?}",
            ids.len(),
            executor_ids
        );

        let results = join_all(ids.iter().map(|id| self.trigger.trigger(id))).await;
        for (id, result) in ids.iter().zip(results) {
            if let Err(e) = result {
                error!("Failed to recover workflow {}: {}", id, e);
            }
        }

        Ok(ids)
    }
}
