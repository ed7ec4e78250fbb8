//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown signal fires.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{delete, get, post};
use axum::Router;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::StreamableHttpService;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    evict_tenant_handler, health_handler, list_tenants_handler, liveness_handler,
    method_not_allowed_handler, readiness_handler, webhook_handler, AppState,
};
use super::middleware::apply_http_layers;
use super::shutdown::ShutdownController;
use crate::mcp::RobotMcpServer;
use crate::service::{OperationPipeline, ServerConfig};
use crate::tenant::TenantConnectionRegistry;

/// Manages the HTTP server lifecycle.
///
/// 1. `new()` -- builds the handler state and the MCP server
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- accepts connections until shutdown is signalled, then
///    drains in-flight operations and closes every tenant pool
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    #[must_use]
    pub fn new(
        config: NetworkConfig,
        registry: Arc<TenantConnectionRegistry>,
        pipeline: OperationPipeline,
        server_config: ServerConfig,
    ) -> Self {
        Self {
            config,
            listener: None,
            state: AppState {
                registry,
                pipeline,
                shutdown: Arc::new(ShutdownController::new()),
                server_config: Arc::new(server_config),
                start_time: Instant::now(),
            },
        }
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// Routes:
    /// - `GET /health` -- detailed health JSON
    /// - `GET /health/live` -- liveness probe
    /// - `GET /health/ready` -- readiness probe
    /// - `GET /admin/tenants`, `DELETE /admin/tenants/{robot_code}` -- tenant pool cache
    /// - `POST /api/v1/messages` -- chat-platform webhook (405 for other methods)
    /// - `/mcp` -- MCP streamable HTTP transport
    pub fn build_router(&self) -> Router {
        let mcp = RobotMcpServer::new(
            self.state.pipeline.clone(),
            Arc::clone(&self.state.shutdown),
            self.state.server_config.operation_timeout_ms,
        );
        let mcp_service = StreamableHttpService::new(
            move || Ok(mcp.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        let routes = Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/admin/tenants", get(list_tenants_handler))
            .route("/admin/tenants/{robot_code}", delete(evict_tenant_handler))
            .route(
                "/api/v1/messages",
                post(webhook_handler).fallback(method_not_allowed_handler),
            )
            .nest_service("/mcp", mcp_service);

        apply_http_layers(routes, &self.config).with_state(self.state.clone())
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which differs from the configured
    /// port when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves connections until the shutdown signal fires.
    ///
    /// After the signal:
    /// 1. Health state transitions to Draining
    /// 2. Waits up to `drain_timeout` for in-flight operations
    /// 3. Closes all cached tenant pools
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called first or the server hits
    /// a fatal I/O error.
    pub async fn serve(
        mut self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = self.build_router();
        let shutdown_ctrl = Arc::clone(&self.state.shutdown);

        shutdown_ctrl.set_ready();
        info!("serving HTTP connections");

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        shutdown_ctrl.trigger_shutdown();
        if shutdown_ctrl.wait_for_drain(self.config.drain_timeout).await {
            info!("all in-flight operations drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "drain timeout expired with operations still running"
            );
        }

        self.state.registry.close_all().await;
        info!("tenant pools closed");
        Ok(())
    }
}
