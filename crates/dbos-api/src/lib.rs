//! # DBOS Admin API
//!
//! HTTP surface an executor exposes to its operators:
//!
//! - `GET /dbos-healthz`: liveness, answers `healthy`
//! - `POST /dbos-workflow-recovery`: recover the `PENDING` workflows of a
//!   list of executor ids, answers the recovered workflow ids
//!
//! Every other path answers 404.

pub mod error;
pub mod http;
pub mod server;
pub mod state;

pub use error::AdminError;
pub use http::routes::{create_admin_router, HEALTHZ_PATH, WORKFLOW_RECOVERY_PATH};
pub use server::{AdminServer, AdminServerConfig};
pub use state::AdminState;
