//! Admin handler state.

use std::sync::Arc;

use dbos_workqueue::RecoveryCoordinator;

/// State shared across admin handlers.
pub struct AdminState {
    pub recovery: Arc<RecoveryCoordinator>,
}

impl AdminState {
    pub fn new(recovery: Arc<RecoveryCoordinator>) -> Self {
        Self { recovery }
    }
}
