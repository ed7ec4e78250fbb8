//! Inbound chat-platform deliveries.
//!
//! The message itself is only logged; the acknowledgement reports which
//! tenant the delivery was resolved to.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;
use tracing::info;

use crate::service::operation::{Operation, OperationError, OperationResponse, WebhookAck};
use crate::tenant::{get_current_tenant_identity, get_tenant_scoped_database};

#[derive(Debug, Default)]
pub struct WebhookService;

impl WebhookService {
    /// Acknowledges a delivery against the bindings of the current flow.
    #[must_use]
    pub fn acknowledge(&self, payload: &serde_json::Value) -> WebhookAck {
        let identity = get_current_tenant_identity().unwrap_or_default();
        let database_bound = get_tenant_scoped_database().is_ok();

        info!(
            robot_code = %identity.robot_code,
            from_wx_id = %identity.from_wx_id,
            sender_wx_id = %identity.sender_wx_id,
            message_id = identity.message_id,
            database_bound,
            payload = %payload,
            "received chat message"
        );

        WebhookAck {
            robot_code: identity.robot_code,
            database_bound,
        }
    }
}

impl Service<Operation> for Arc<WebhookService> {
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let svc = Arc::clone(self);
        Box::pin(async move {
            match op {
                Operation::WebhookMessage { payload, .. } => {
                    Ok(OperationResponse::Webhook(svc.acknowledge(&payload)))
                }
                other => Err(OperationError::Internal(anyhow::anyhow!(
                    "webhook service received {} operation",
                    other.ctx().service_name
                ))),
            }
        })
    }
}
