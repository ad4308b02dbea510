//! Admin handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::error::AdminError;
use crate::state::AdminState;

/// Health probe body.
pub const HEALTHY: &str = "healthy";

/// Liveness probe.
pub async fn healthz() -> &'static str {
    HEALTHY
}

/// Recover the `PENDING` workflows of the given executors.
///
/// Request body: JSON array of executor ids. Response: JSON array of the
/// workflow ids handed back to execution.
pub async fn workflow_recovery(
    State(state): State<Arc<AdminState>>,
    Json(executor_ids): Json<Vec<String>>,
) -> Result<Json<Vec<String>>, AdminError> {
    info!("Recovery requested for executors {:?}", executor_ids);
    let workflow_ids = state.recovery.recover(&executor_ids).await?;
    Ok(Json(workflow_ids))
}

/// Answer for paths and methods the admin surface does not serve.
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
