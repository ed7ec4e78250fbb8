//! Per-operation deadline.
//!
//! Each operation carries its own `call_timeout_ms`; zero means "use the
//! pipeline default". The deadline covers tenant resolution as well as the
//! domain handler, since this layer sits outside the tenant layer.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{Operation, OperationError, OperationResponse};

/// Deadline applied to one operation, in milliseconds.
fn deadline_ms(requested_ms: u64, default_ms: u64) -> u64 {
    if requested_ms == 0 {
        default_ms
    } else {
        requested_ms
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutLayer {
    default_ms: u64,
}

impl TimeoutLayer {
    /// `default_ms` applies to operations that carry no timeout of their own.
    #[must_use]
    pub fn new(default_ms: u64) -> Self {
        Self { default_ms }
    }
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            default_ms: self.default_ms,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    inner: S,
    default_ms: u64,
}

impl<S> Service<Operation> for TimeoutService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = Result<OperationResponse, OperationError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let timeout_ms = deadline_ms(op.ctx().call_timeout_ms, self.default_ms);
        let service = op.ctx().service_name;
        let call_id = op.ctx().call_id;
        let work = self.inner.call(op);

        Box::pin(async move {
            tokio::time::timeout(Duration::from_millis(timeout_ms), work)
                .await
                .unwrap_or_else(|_| {
                    warn!(service, call_id, timeout_ms, "operation deadline exceeded");
                    Err(OperationError::Timeout { timeout_ms })
                })
        })
    }
}
