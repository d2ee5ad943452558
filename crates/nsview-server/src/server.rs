//! Viewer server implementation.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use nsview_broker::Broker;
use nsview_redact::RedactionPolicy;

use crate::config::ServerConfig;
use crate::error::{ViewerError, ViewerResult};
use crate::routes::create_router;
use crate::state::{AppState, ClusterView};

/// The viewer API server.
///
/// Owns the shared state; the broker and cluster handle are constructed
/// by the caller so the same broker instance also feeds the watch
/// pipeline.
#[derive(Debug, Clone)]
pub struct ViewerServer {
    state: AppState,
}

impl ViewerServer {
    /// Create a new viewer server.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        broker: Broker,
        cluster: Arc<dyn ClusterView>,
        policy: Arc<RedactionPolicy>,
    ) -> Self {
        Self {
            state: AppState::new(config, broker, cluster, policy),
        }
    }

    /// The shared server state.
    #[must_use]
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Create the router without starting the server.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        create_router(self.state.clone())
    }

    /// Start the server on the configured bind address and listen for
    /// connections until a fatal error.
    pub async fn serve(&self) -> ViewerResult<()> {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ViewerError::BindFailed(addr, e))?;

        info!(addr = %addr, "viewer server listening");

        axum::serve(listener, self.router())
            .await
            .map_err(|e| ViewerError::Internal(e.to_string()))?;
        Ok(())
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server shuts down when the provided future completes; open
    /// SSE streams are dropped, which unregisters their subscriptions.
    pub async fn serve_with_shutdown<F>(&self, shutdown: F) -> ViewerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let addr = self.state.config().bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ViewerError::BindFailed(addr, e))?;

        info!(addr = %addr, "viewer server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ViewerError::Internal(e.to_string()))?;

        info!("viewer server shut down");
        Ok(())
    }
}
