//! Operation types flowing through the tower pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use robot_mcp_core::Metadata;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tenant::ContextError;

/// Service names used by the router.
pub mod service_names {
    pub const CHAT_ROOM_SUMMARY: &str = "chat_room_summary";
    pub const WEBHOOK: &str = "webhook";
}

static NEXT_CALL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique, monotonically increasing call id.
#[must_use]
pub fn next_call_id() -> u64 {
    NEXT_CALL_ID.fetch_add(1, Ordering::Relaxed)
}

/// Context carried with every operation through the pipeline.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub call_id: u64,
    pub service_name: &'static str,
    pub received_at: DateTime<Utc>,
    pub call_timeout_ms: u64,
}

impl OperationContext {
    #[must_use]
    pub fn new(call_id: u64, service_name: &'static str, call_timeout_ms: u64) -> Self {
        Self {
            call_id,
            service_name,
            received_at: Utc::now(),
            call_timeout_ms,
        }
    }
}

/// Arguments of the `ChatRoomSummary` tool.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ChatRoomSummaryInput {
    /// How far back to summarize, in seconds. For example 3600 is the last
    /// hour and 86400 the last day.
    pub recent_duration: i64,
}

/// Typed operation variants dispatched through the pipeline.
///
/// `meta` is the tenant metadata the resolver reads; `None` means the caller
/// sent none.
#[derive(Debug)]
pub enum Operation {
    ChatRoomSummary {
        ctx: OperationContext,
        meta: Option<Metadata>,
        input: ChatRoomSummaryInput,
    },
    WebhookMessage {
        ctx: OperationContext,
        meta: Option<Metadata>,
        payload: serde_json::Value,
    },
}

impl Operation {
    #[must_use]
    pub fn ctx(&self) -> &OperationContext {
        match self {
            Self::ChatRoomSummary { ctx, .. } | Self::WebhookMessage { ctx, .. } => ctx,
        }
    }

    #[must_use]
    pub fn meta(&self) -> Option<&Metadata> {
        match self {
            Self::ChatRoomSummary { meta, .. } | Self::WebhookMessage { meta, .. } => {
                meta.as_ref()
            }
        }
    }
}

/// Acknowledgement of a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    /// Robot code of the resolved tenant; empty when none was resolved.
    pub robot_code: String,
    pub database_bound: bool,
}

/// Successful response from an operation handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResponse {
    /// User-facing text result.
    Text(String),
    Webhook(WebhookAck),
}

/// Errors returned by operation handlers and middleware.
///
/// Every variant is reported to the caller as a structured error; none of
/// them is fatal to the process.
#[derive(Debug, thiserror::Error)]
pub enum OperationError {
    #[error("no tenant identity resolved for this request")]
    NoTenantIdentity,
    #[error("no tenant database bound for this request")]
    NoTenantDatabaseBound,
    /// Caller-supplied arguments failed validation.
    #[error("{0}")]
    InvalidInput(String),
    /// Tenant data or settings do not allow the operation.
    #[error("{0}")]
    Rejected(String),
    /// A downstream HTTP service failed.
    #[error("{0}")]
    Upstream(String),
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
    #[error("server overloaded, try again later")]
    Overloaded,
    #[error("unknown service: {name}")]
    UnknownService { name: String },
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ContextError> for OperationError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::NoTenantIdentity => Self::NoTenantIdentity,
            ContextError::NoTenantDatabaseBound => Self::NoTenantDatabaseBound,
            ContextError::NoActiveFlow => Self::Internal(anyhow::anyhow!(e)),
        }
    }
}
