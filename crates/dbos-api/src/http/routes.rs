//! Admin route definitions.
//!
//! ```text
//! GET  /dbos-healthz            - "healthy"
//! POST /dbos-workflow-recovery  - ["executor-id", ...] -> ["workflow-id", ...]
//! *                             - 404
//! ```

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::http::handlers::{healthz, not_found, workflow_recovery};
use crate::state::AdminState;

pub const HEALTHZ_PATH: &str = "/dbos-healthz";
pub const WORKFLOW_RECOVERY_PATH: &str = "/dbos-workflow-recovery";

/// Build the admin router.
///
/// A known path requested with another method answers 404 as well, not 405.
pub fn create_admin_router(state: Arc<AdminState>) -> Router {
    Router::new()
        .route(HEALTHZ_PATH, get(healthz).fallback(not_found))
        .route(WORKFLOW_RECOVERY_PATH, post(workflow_recovery).fallback(not_found))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
