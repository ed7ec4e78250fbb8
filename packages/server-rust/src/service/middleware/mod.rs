//! Layers wrapped around the operation router.
//!
//! [`pipeline`] stacks them in order: [`load_shed`] caps concurrency,
//! [`timeout`] applies the operation deadline, [`metrics`] records the
//! outcome and [`tenant`] binds the caller's identity and database.

pub mod load_shed;
pub mod metrics;
pub mod pipeline;
pub mod tenant;
pub mod timeout;

pub use load_shed::LoadShedLayer;
pub use metrics::MetricsLayer;
pub use pipeline::{build_operation_pipeline, OperationPipeline};
pub use tenant::TenantLayer;
pub use timeout::TimeoutLayer;
