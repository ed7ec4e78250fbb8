//! Operation timing.
//!
//! Every operation runs inside an `operation` span that ends up carrying its
//! duration and outcome. Log output is the only sink.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::field::Empty;
use tracing::{info, info_span, warn, Instrument, Span};

use crate::service::operation::{Operation, OperationError, OperationResponse};

type OperationResult = Result<OperationResponse, OperationError>;

#[derive(Debug, Clone)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

/// Value of the span's `outcome` field.
fn outcome_label(result: &OperationResult) -> &'static str {
    let Err(err) = result else {
        return "ok";
    };
    match err {
        OperationError::Timeout { .. } => "timeout",
        OperationError::Overloaded => "overloaded",
        OperationError::NoTenantIdentity
        | OperationError::NoTenantDatabaseBound
        | OperationError::InvalidInput(_)
        | OperationError::Rejected(_) => "rejected",
        _ => "error",
    }
}

/// Fills in the span fields and emits the completion event.
fn report(span: &Span, started: Instant, result: &OperationResult) {
    let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    let outcome = outcome_label(result);
    span.record("duration_ms", duration_ms);
    span.record("outcome", outcome);

    if let Err(err) = result {
        warn!(duration_ms, outcome, error = %err, "operation failed");
    } else {
        info!(duration_ms, outcome, "operation complete");
    }
}

impl<S> Service<Operation> for MetricsService<S>
where
    S: Service<Operation, Response = OperationResponse, Error = OperationError> + Send,
    S::Future: Send + 'static,
{
    type Response = OperationResponse;
    type Error = OperationError;
    type Future = Pin<Box<dyn Future<Output = OperationResult> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, op: Operation) -> Self::Future {
        let span = info_span!(
            "operation",
            service = op.ctx().service_name,
            call_id = op.ctx().call_id,
            duration_ms = Empty,
            outcome = Empty,
        );
        let work = self.inner.call(op);
        let started = Instant::now();

        let recorder = span.clone();
        Box::pin(
            async move {
                let result = work.await;
                report(&recorder, started, &result);
                result
            }
            .instrument(span),
        )
    }
}
