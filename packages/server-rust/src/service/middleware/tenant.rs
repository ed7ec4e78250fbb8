//! Tenant resolution middleware.
//!
//! Opens a flow scope for each operation, resolves the operation's metadata
//! into identity and database bindings, then runs the inner service inside
//! the same scope. Resolution never fails the operation; handlers check the
//! bindings themselves.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::{Layer, Service};
use tracing::debug;

use crate::service::operation::{Operation, OperationError, OperationResponse};
use crate::tenant::{RequestContext, TenantResolver};

// ---------------------------------------------------------------------------
// TenantLayer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TenantLayer {
    resolver: TenantResolver,
}

impl TenantLayer {
    #[must_use]
    pub fn new(resolver: TenantResolver) -> Self {
        Self { resolver }
    }
}

impl<S> Layer<S> for TenantLayer {
    type Service = TenantService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TenantService {
            inner,
            resolver: self.resolver.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TenantService
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TenantService<S> {
    inner: S,
    resolver: TenantResolver,
}

impl<S> Service<Operation> for TenantService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        // The readied service moves into the future; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let resolver = self.resolver.clone();

        Box::pin(RequestContext::scope(async move {
            let resolution = resolver.apply(op.meta()).await;
            debug!(call_id = op.ctx().call_id, resolution = ?resolution, "tenant resolved");
            inner.call(op).await
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use robot_mcp_core::Metadata;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::service::operation::{service_names, OperationContext};
    use crate::tenant::registry::tests::FakeConnector;
    use crate::tenant::{
        get_current_tenant_identity, get_tenant_scoped_database, PoolConnector,
        TenantConnectionRegistry,
    };

    /// Reports what the flow sees: `robot_code/from_wx_id/db-bound`.
    #[derive(Clone)]
    struct ProbeService;

    impl Service<Operation> for ProbeService {
        type Response = OperationResponse;
        type Error = OperationError;
        type Future =
            Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _op: Operation) -> Self::Future {
            Box::pin(async move {
                tokio::task::yield_now().await;
                let identity = get_current_tenant_identity().ok_or(OperationError::NoTenantIdentity)?;
                let bound = get_tenant_scoped_database().is_ok();
                Ok(OperationResponse::Text(format!(
                    "{}/{}/{bound}",
                    identity.robot_code, identity.from_wx_id
                )))
            })
        }
    }

    fn layer(connector: &Arc<FakeConnector>) -> (TenantLayer, Arc<TenantConnectionRegistry>) {
        let dyn_connector: Arc<dyn PoolConnector> = connector.clone();
        let registry = Arc::new(TenantConnectionRegistry::new(
            dyn_connector,
            Duration::from_secs(5),
        ));
        (
            TenantLayer::new(TenantResolver::new(Arc::clone(&registry))),
            registry,
        )
    }

    fn op(meta: Option<serde_json::Value>) -> Operation {
        let meta = meta.map(|v| match v {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        });
        Operation::WebhookMessage {
            ctx: OperationContext::new(1, service_names::WEBHOOK, 5000),
            meta,
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn binds_identity_and_database_for_inner_service() {
        let connector = Arc::new(FakeConnector::default());
        let (layer, registry) = layer(&connector);
        let svc = layer.layer(ProbeService);

        let resp = svc
            .oneshot(op(Some(json!({
                "RobotCode": "shop001",
                "FromWxID": "room1",
                "SenderWxID": "user1",
                "MessageID": 42
            }))))
            .await
            .unwrap();

        assert_eq!(resp, OperationResponse::Text("shop001/room1/true".to_string()));
        assert_eq!(registry.cached_tenants(), vec!["shop001".to_string()]);
    }

    #[tokio::test]
    async fn missing_metadata_reaches_handler_unbound() {
        let connector = Arc::new(FakeConnector::default());
        let (layer, _) = layer(&connector);

        let err = layer.layer(ProbeService).oneshot(op(None)).await.unwrap_err();
        assert!(matches!(err, OperationError::NoTenantIdentity));
        assert_eq!(connector.count(), 0);
    }

    #[tokio::test]
    async fn unavailable_database_does_not_fail_the_operation() {
        let connector = Arc::new(FakeConnector::failing(1));
        let (layer, registry) = layer(&connector);

        let resp = layer
            .layer(ProbeService)
            .oneshot(op(Some(json!({"RobotCode": "shop001", "FromWxID": "room1"}))))
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Text("shop001/room1/false".to_string()));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn concurrent_operations_see_only_their_own_tenant() {
        let connector = Arc::new(FakeConnector::default());
        let (layer, _) = layer(&connector);
        let svc = layer.layer(ProbeService);

        let a = svc
            .clone()
            .oneshot(op(Some(json!({"RobotCode": "A", "FromWxID": "roomA"}))));
        let b = svc.oneshot(op(Some(json!({"RobotCode": "B", "FromWxID": "roomB"}))));
        let (a, b) = tokio::join!(a, b);

        assert_eq!(a.unwrap(), OperationResponse::Text("A/roomA/true".to_string()));
        assert_eq!(b.unwrap(), OperationResponse::Text("B/roomB/true".to_string()));
    }
}
