//! Queue dispatcher loop.
//!
//! Every tick the dispatcher walks the registered queues, asks the admission
//! engine which workflows may start, and hands each admitted id to the
//! execution trigger. A failing queue is logged and skipped; the loop only
//! ends when stopped.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::admission::AdmissionEngine;
use crate::registry::QueueRegistry;
use crate::trigger::ExecutionTrigger;

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;

/// Default time between dispatch passes.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle of the dispatcher loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    /// Stop requested, loop not yet exited.
    Stopping,
    Stopped,
}

/// Result of one dispatch pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Ids promoted to `PENDING` and handed to the trigger.
    pub admitted: Vec<String>,
    /// Queues whose admission failed on this pass.
    pub failed_queues: Vec<String>,
}

/// Periodic admission loop over all registered queues.
pub struct QueueDispatcher {
    registry: Arc<QueueRegistry>,
    engine: AdmissionEngine,
    trigger: Arc<dyn ExecutionTrigger>,
    tick_interval: Duration,
    state: RwLock<DispatcherState>,
    stop_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueDispatcher {
    pub fn new(
        registry: Arc<QueueRegistry>,
        engine: AdmissionEngine,
        trigger: Arc<dyn ExecutionTrigger>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            registry,
            engine,
            trigger,
            tick_interval: DEFAULT_TICK_INTERVAL,
            state: RwLock::new(DispatcherState::Stopped),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    /// Set the tick interval.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    pub fn state(&self) -> DispatcherState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.state() == DispatcherState::Running
    }

    /// Spawn the loop on the current tokio runtime.
    ///
    /// Returns false when the dispatcher is not `Stopped`.
    pub fn start(self: &Arc<Self>) -> bool {
        {
            let mut state = self.state.write();
            if *state != DispatcherState::Stopped {
                return false;
            }
            *state = DispatcherState::Running;
        }

        self.stop_tx.send_replace(false);
        let stop_rx = self.stop_tx.subscribe();
        let handle = tokio::spawn(self.clone().run(stop_rx));
        *self.handle.lock() = Some(handle);
        true
    }

    /// Request the loop to exit. Returns immediately; the loop exits at its
    /// next wait or between queues of the current pass.
    pub fn stop(&self) {
        let mut state = self.state.write();
        if *state == DispatcherState::Running {
            *state = DispatcherState::Stopping;
            self.stop_tx.send_replace(true);
            info!("Queue dispatcher stop requested");
        }
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Queue dispatcher task failed: {}", e);
            }
        }
        *self.state.write() = DispatcherState::Stopped;
    }

    fn stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    async fn run(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        info!(
            "Queue dispatcher started (executor: {}, tick interval: {:?})",
            self.engine.executor_id(),
            self.tick_interval
        );

        loop {
            tokio::select! {
                _ = time::sleep(self.tick_interval) => {}
                _ = stop_rx.changed() => break,
            }
            if self.stop_requested() {
                break;
            }

            let report = self.tick().await;
            if !report.admitted.is_empty() {
                debug!("Dispatch pass admitted {} workflow(s)", report.admitted.len());
            }
        }

        *self.state.write() = DispatcherState::Stopped;
        info!("Queue dispatcher stopped");
    }

    /// Run one dispatch pass over every registered queue.
    pub async fn tick(&self) -> TickReport {
        let mut report = TickReport::default();

        for queue in self.registry.all() {
            if self.stop_requested() {
                break;
            }

            let ids = match self.engine.admit(&queue).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!("Failed to admit workflows from queue '{}': {}", queue.name(), e);
                    report.failed_queues.push(queue.name().to_string());
                    continue;
                }
            };

            for id in ids {
                if let Err(e) = self.trigger.trigger(&id).await {
                    error!("Failed to start workflow {} from queue '{}': {}", id, queue.name(), e);
                }
                report.admitted.push(id);
            }
        }

        report
    }
}
