//! HTTP handler definitions.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod admin;
pub mod health;
pub mod webhook;

pub use admin::{evict_tenant_handler, list_tenants_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use webhook::{method_not_allowed_handler, webhook_handler};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::{OperationPipeline, ServerConfig};
use crate::tenant::TenantConnectionRegistry;

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references and a pipeline handle so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Tenant pools, reported by the health endpoint and managed under `/admin`.
    pub registry: Arc<TenantConnectionRegistry>,
    /// Operation pipeline the webhook dispatches into.
    pub pipeline: OperationPipeline,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    pub server_config: Arc<ServerConfig>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::domain::{domain_router, WebhookService};
    use crate::service::build_operation_pipeline;
    use crate::service::domain::ChatRoomSummaryService;
    use crate::storage::MySqlStoreProvider;
    use crate::clients::{CompletionClient, RobotClient};
    use crate::tenant::registry::tests::FakeConnector;
    use crate::tenant::{PoolConnector, TenantResolver};

    /// State over a fake connector; the summary service points nowhere.
    pub(crate) fn test_state() -> (AppState, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let dyn_connector: Arc<dyn PoolConnector> = connector.clone();
        let registry = Arc::new(TenantConnectionRegistry::new(
            dyn_connector,
            Duration::from_secs(5),
        ));

        let summary = Arc::new(ChatRoomSummaryService::new(
            Arc::new(MySqlStoreProvider),
            CompletionClient::new(Duration::from_secs(1)).unwrap(),
            RobotClient::new("http://127.0.0.1:1", Duration::from_secs(1)).unwrap(),
        ));
        let router = domain_router(summary, Arc::new(WebhookService));
        let server_config = ServerConfig::default();
        let pipeline = build_operation_pipeline(
            router,
            TenantResolver::new(Arc::clone(&registry)),
            &server_config,
        );

        (
            AppState {
                registry,
                pipeline,
                shutdown: Arc::new(ShutdownController::new()),
                server_config: Arc::new(server_config),
                start_time: Instant::now(),
            },
            connector,
        )
    }
}
