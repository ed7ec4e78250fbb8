//! Concurrency cap for the operation pipeline.
//!
//! Past `max_concurrent_operations` an operation fails at once with
//! `OperationError::Overloaded`; nothing queues.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::Semaphore;
use tower::{Layer, Service};
use tracing::warn;

use crate::service::operation::{Operation, OperationError, OperationResponse};

/// Shared permit pool. Every service built from one layer draws on it.
#[derive(Debug)]
struct Permits {
    limit: usize,
    semaphore: Semaphore,
}

#[derive(Debug, Clone)]
pub struct LoadShedLayer {
    permits: Arc<Permits>,
}

impl LoadShedLayer {
    #[must_use]
    pub fn new(max_concurrent: u32) -> Self {
        let limit = max_concurrent as usize;
        Self {
            permits: Arc::new(Permits {
                limit,
                semaphore: Semaphore::new(limit),
            }),
        }
    }

    #[must_use]
    pub fn available(&self) -> usize {
        self.permits.semaphore.available_permits()
    }

    /// Operations currently holding a permit.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.permits.limit - self.available()
    }
}

impl<S> Layer<S> for LoadShedLayer {
    type Service = LoadShedService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoadShedService {
            inner,
            permits: Arc::clone(&self.permits),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LoadShedService<S> {
    inner: S,
    permits: Arc<Permits>,
}

impl<S> Service<Operation> for LoadShedService<S>
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
        // Held from here until the returned future completes or is dropped.
        match self.permits.semaphore.try_acquire() {
            Ok(permit) => {
                permit.forget();
                let guard = PermitReturn(Arc::clone(&self.permits));
                let work = self.inner.call(op);
                Box::pin(async move {
                    let _guard = guard;
                    work.await
                })
            }
            Err(_) => {
                warn!(
                    service = op.ctx().service_name,
                    call_id = op.ctx().call_id,
                    limit = self.permits.limit,
                    "operation rejected, concurrency limit reached"
                );
                Box::pin(std::future::ready(Err(OperationError::Overloaded)))
            }
        }
    }
}

/// Puts one permit back when the operation's future finishes or is dropped.
struct PermitReturn(Arc<Permits>);

impl Drop for PermitReturn {
    fn drop(&mut self) {
        self.0.semaphore.add_permits(1);
    }
}
