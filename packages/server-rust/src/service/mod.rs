//! Operation routing and execution framework.
//!
//! This module implements the service-oriented operation pipeline:
//!
//! 1. **Operations** (`operation`): typed requests built by the MCP and HTTP surfaces
//! 2. **Middleware** (`middleware`): Tower layers (load shedding, timeout, metrics, tenant)
//! 3. **Routing** (`router`): Dispatch to domain services by `service_name`
//! 4. **Domain services** (`domain`): chat-room summary and webhook intake

pub mod config;
pub mod domain;
pub mod middleware;
pub mod operation;
pub mod router;

pub use config::ServerConfig;
pub use middleware::{build_operation_pipeline, OperationPipeline};
pub use operation::{
    next_call_id, service_names, ChatRoomSummaryInput, Operation, OperationContext,
    OperationError, OperationResponse, WebhookAck,
};
pub use router::OperationRouter;
