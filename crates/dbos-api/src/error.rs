//! Admin API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use dbos_workqueue::QueueError;

/// Admin API error types.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Recovery could not query the workflow store.
    #[error("Workflow recovery failed: {0}")]
    Recovery(#[from] QueueError),

    /// Listen address could not be parsed.
    #[error("Invalid admin address: {0}")]
    InvalidAddress(String),

    /// Socket error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AdminError {
    fn code(&self) -> &'static str {
        match self {
            AdminError::Recovery(_) => "recovery_failed",
            AdminError::InvalidAddress(_) => "invalid_address",
            AdminError::Io(_) => "io_error",
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        error!("Admin request failed: {}", self);
        let body = ErrorResponse::new(self.to_string(), self.code());
        (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_error_is_500() {
        let err = AdminError::from(QueueError::Database("database is locked".to_string()));
        assert!(err.to_string().contains("database is locked"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_error_response_serialize() {
        let json = serde_json::to_string(&ErrorResponse::new("boom", "io_error")).unwrap();
        assert_eq!(json, r#"{"error":"boom","code":"io_error"}"#);
    }
}
