//! Admin server.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use dbos_config::AdminConfig;
use dbos_workqueue::RecoveryCoordinator;

use crate::error::AdminError;
use crate::http::routes::create_admin_router;
use crate::state::AdminState;

/// Admin server configuration.
#[derive(Debug, Clone)]
pub struct AdminServerConfig {
    pub host: String,
    pub port: u16,
}

impl AdminServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for AdminServerConfig {
    fn default() -> Self {
        Self::from(&AdminConfig::default())
    }
}

impl From<&AdminConfig> for AdminServerConfig {
    fn from(config: &AdminConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

/// The admin server.
pub struct AdminServer {
    config: AdminServerConfig,
    state: Arc<AdminState>,
}

impl AdminServer {
    pub fn new(config: AdminServerConfig, recovery: Arc<RecoveryCoordinator>) -> Self {
        Self {
            config,
            state: Arc::new(AdminState::new(recovery)),
        }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Bind the configured address.
    pub async fn bind(&self) -> Result<TcpListener, AdminError> {
        let addr: SocketAddr = self
            .addr()
            .parse()
            .map_err(|_| AdminError::InvalidAddress(self.addr()))?;
        Ok(TcpListener::bind(addr).await?)
    }

    /// Bind and serve until `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), AdminError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = self.bind().await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), AdminError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_admin_router(self.state.clone());
        info!("Admin server listening on {}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Admin server stopped");
        Ok(())
    }
}
