//! Process-wide queue registry.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use dbos_config::QueueConfig;

use crate::error::QueueError;
use crate::queue::Queue;

/// Queue definitions keyed by name, kept in registration order.
///
/// Append-only: a second registration under an existing name is rejected.
#[derive(Default)]
pub struct QueueRegistry {
    queues: RwLock<Vec<Arc<Queue>>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from declared queues, in declaration order.
    pub fn from_configs(configs: &[QueueConfig]) -> Result<Self, QueueError> {
        let registry = Self::new();
        for config in configs {
            registry.register(Queue::try_from(config)?)?;
        }
        Ok(registry)
    }

    /// Register a queue.
    pub fn register(&self, queue: Queue) -> Result<Arc<Queue>, QueueError> {
        let mut queues = self.queues.write();
        if queues.iter().any(|q| q.name() == queue.name()) {
            return Err(QueueError::DuplicateQueue(queue.name().to_string()));
        }

        debug!(
            "Registering queue '{}' (concurrency: {:?}, limiter: {:?})",
            queue.name(),
            queue.concurrency(),
            queue.limiter()
        );
        let queue = Arc::new(queue);
        queues.push(queue.clone());
        Ok(queue)
    }

    /// Snapshot of all queues in registration order.
    pub fn all(&self) -> Vec<Arc<Queue>> {
        self.queues.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.read().iter().find(|q| q.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.queues.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.read().is_empty()
    }
}
