//! Operation routing: dispatches `Operation` to domain services by `service_name`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tower::util::BoxCloneSyncService;
use tower::{Service, ServiceExt};

use super::operation::{Operation, OperationError, OperationResponse};

/// A boxed, cloneable Tower service that handles operations for a single domain.
type DomainService = BoxCloneSyncService<Operation, OperationResponse, OperationError>;

// ---------------------------------------------------------------------------
// OperationRouter
// ---------------------------------------------------------------------------

/// Routes `Operation` values to the correct domain service by `service_name`.
///
/// Each registered domain service is a `tower::Service<Operation>` keyed by
/// its service name (e.g., `"chat_room_summary"`, `"webhook"`). Operations
/// with an unregistered `service_name` return `OperationError::UnknownService`.
///
/// Cloning the router clones the handles to the registered services, so one
/// router can back any number of concurrent callers.
#[derive(Clone, Default)]
pub struct OperationRouter {
    services: HashMap<&'static str, DomainService>,
}

impl OperationRouter {
    /// Create a new empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain service for the given name.
    pub fn register<S>(&mut self, name: &'static str, service: S)
    where
        S: Service<Operation, Response = OperationResponse, Error = OperationError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        self.services.insert(name, BoxCloneSyncService::new(service));
    }

    /// Names of the registered services, sorted.
    #[must_use]
    pub fn service_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.services.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for OperationRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRouter")
            .field("services", &self.service_names())
            .finish()
    }
}

impl Service<Operation> for OperationRouter {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is checked per call on the selected service.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let service_name = op.ctx().service_name;
        match self.services.get(service_name) {
            Some(svc) => Box::pin(svc.clone().oneshot(op)),
            None => Box::pin(async move {
                Err(OperationError::UnknownService {
                    name: service_name.to_string(),
                })
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::operation::{service_names, OperationContext};

    /// Echoes the name it was registered with.
    #[derive(Clone)]
    struct StubService {
        name: &'static str,
    }

    impl Service<Operation> for StubService {
        type Response = OperationResponse;
        type Error = OperationError;
        type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, op: Operation) -> Self::Future {
            let name = self.name;
            let call_id = op.ctx().call_id;
            Box::pin(async move { Ok(OperationResponse::Text(format!("{name}:{call_id}"))) })
        }
    }

    fn make_op(service_name: &'static str) -> Operation {
        Operation::WebhookMessage {
            ctx: OperationContext::new(1, service_name, 5000),
            meta: None,
            payload: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn routes_to_registered_service() {
        let mut router = OperationRouter::new();
        router.register(service_names::WEBHOOK, StubService { name: "webhook" });

        let resp = router.oneshot(make_op(service_names::WEBHOOK)).await.unwrap();
        assert_eq!(resp, OperationResponse::Text("webhook:1".to_string()));
    }

    #[tokio::test]
    async fn unknown_service_returns_error() {
        let mut router = OperationRouter::new();
        router.register(service_names::WEBHOOK, StubService { name: "webhook" });

        let err = router.oneshot(make_op("nonexistent")).await.unwrap_err();
        assert!(matches!(
            err,
            OperationError::UnknownService { name } if name == "nonexistent"
        ));
    }

    #[tokio::test]
    async fn routes_to_correct_service_among_multiple() {
        let mut router = OperationRouter::new();
        router.register(service_names::WEBHOOK, StubService { name: "webhook" });
        router.register(
            service_names::CHAT_ROOM_SUMMARY,
            StubService { name: "summary" },
        );
        assert_eq!(router.service_names(), vec!["chat_room_summary", "webhook"]);

        let resp = router
            .clone()
            .oneshot(make_op(service_names::CHAT_ROOM_SUMMARY))
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Text("summary:1".to_string()));

        let resp = ServiceExt::ready(&mut router)
            .await
            .unwrap()
            .call(make_op(service_names::WEBHOOK))
            .await
            .unwrap();
        assert_eq!(resp, OperationResponse::Text("webhook:1".to_string()));
    }
}
