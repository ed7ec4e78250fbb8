//! Pipeline composition: combines all middleware layers into a single service stack.

use tower::util::BoxCloneSyncService;
use tower::ServiceBuilder;

use super::load_shed::LoadShedLayer;
use super::metrics::MetricsLayer;
use super::tenant::TenantLayer;
use super::timeout::TimeoutLayer;
use crate::service::config::ServerConfig;
use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::service::router::OperationRouter;
use crate::tenant::TenantResolver;

/// The composed pipeline, shared by the MCP handler and the webhook handler.
pub type OperationPipeline = BoxCloneSyncService<Operation, OperationResponse, OperationError>;

/// Build the operation pipeline by wrapping the `OperationRouter` with middleware layers.
///
/// Layer order (outermost to innermost):
/// 1. `LoadShedLayer` -- reject when overloaded (fail fast before doing any work)
/// 2. `TimeoutLayer` -- enforce per-operation deadlines, tenant resolution included
/// 3. `MetricsLayer` -- record timing and outcome
/// 4. `TenantLayer` -- open the flow scope and bind identity and database
#[must_use]
pub fn build_operation_pipeline(
    router: OperationRouter,
    resolver: TenantResolver,
    config: &ServerConfig,
) -> OperationPipeline {
    BoxCloneSyncService::new(
        ServiceBuilder::new()
            .layer(LoadShedLayer::new(config.max_concurrent_operations))
            .layer(TimeoutLayer::new(config.operation_timeout_ms))
            .layer(MetricsLayer)
            .layer(TenantLayer::new(resolver))
            .service(router),
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{Context, Poll};
    use std::time::Duration;

    use serde_json::json;
    use tower::{Service, ServiceExt};

    use super::*;
    use crate::service::operation::{service_names, ChatRoomSummaryInput, OperationContext};
    use crate::tenant::registry::tests::FakeConnector;
    use crate::tenant::{get_current_tenant_identity, PoolConnector, TenantConnectionRegistry};

    /// Answers with the robot code bound in the current flow.
    #[derive(Clone)]
    struct WhoAmI {
        delay: Duration,
    }

    impl Service<Operation> for WhoAmI {
        type Response = OperationResponse;
        type Error = OperationError;
        type Future =
            Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _op: Operation) -> Self::Future {
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                let identity =
                    get_current_tenant_identity().ok_or(OperationError::NoTenantIdentity)?;
                Ok(OperationResponse::Text(identity.robot_code))
            })
        }
    }

    fn pipeline(delay: Duration, config: &ServerConfig) -> (OperationPipeline, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::default());
        let dyn_connector: Arc<dyn PoolConnector> = connector.clone();
        let registry = Arc::new(TenantConnectionRegistry::new(
            dyn_connector,
            Duration::from_secs(5),
        ));

        let mut router = OperationRouter::new();
        router.register(service_names::CHAT_ROOM_SUMMARY, WhoAmI { delay });
        (
            build_operation_pipeline(router, TenantResolver::new(registry), config),
            connector,
        )
    }

    fn summary_op(robot_code: &str, timeout_ms: u64) -> Operation {
        let meta = json!({"RobotCode": robot_code, "MessageID": 1});
        Operation::ChatRoomSummary {
            ctx: OperationContext::new(42, service_names::CHAT_ROOM_SUMMARY, timeout_ms),
            meta: meta.as_object().cloned(),
            input: ChatRoomSummaryInput { recent_duration: 3600 },
        }
    }

    #[tokio::test]
    async fn pipeline_routes_through_all_layers() {
        let (svc, connector) = pipeline(Duration::ZERO, &ServerConfig::default());

        let resp = svc.clone().oneshot(summary_op("shop001", 5000)).await.unwrap();
        assert_eq!(resp, OperationResponse::Text("shop001".to_string()));

        // Same tenant, different message: the cached pool is reused.
        let resp = svc.oneshot(summary_op("shop001", 5000)).await.unwrap();
        assert_eq!(resp, OperationResponse::Text("shop001".to_string()));
        assert_eq!(connector.count(), 1);
    }

    #[tokio::test]
    async fn pipeline_enforces_operation_timeout() {
        let (svc, _) = pipeline(Duration::from_millis(200), &ServerConfig::default());
        let err = svc.oneshot(summary_op("shop001", 20)).await.unwrap_err();
        assert!(matches!(err, OperationError::Timeout { timeout_ms: 20 }));
    }

    #[tokio::test]
    async fn pipeline_sheds_load_past_the_limit() {
        let config = ServerConfig {
            max_concurrent_operations: 1,
            ..ServerConfig::default()
        };
        let (mut svc, _) = pipeline(Duration::from_millis(300), &config);

        let first = ServiceExt::ready(&mut svc)
            .await
            .unwrap()
            .call(summary_op("shop001", 5000));
        let second = svc.clone().oneshot(summary_op("shop002", 5000)).await;
        assert!(matches!(second, Err(OperationError::Overloaded)));
        assert!(first.await.is_ok());
    }

    #[tokio::test]
    async fn unknown_service_is_reported() {
        let (svc, _) = pipeline(Duration::ZERO, &ServerConfig::default());
        let op = Operation::WebhookMessage {
            ctx: OperationContext::new(1, service_names::WEBHOOK, 5000),
            meta: None,
            payload: json!({}),
        };
        let err = svc.oneshot(op).await.unwrap_err();
        assert!(matches!(err, OperationError::UnknownService { .. }));
    }
}
