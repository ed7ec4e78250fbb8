//! Chat-platform webhook: `POST /api/v1/messages`.
//!
//! Deliveries run through the operation pipeline like tool calls do, so the
//! tenant named in the payload gets its identity and database bound before
//! the webhook service sees it.

use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use robot_mcp_core::{ApiResponse, Metadata};
use serde_json::{json, Value};
use tower::ServiceExt;
use tracing::{error, warn};

use super::AppState;
use crate::service::{
    next_call_id, service_names, Operation, OperationContext, OperationError, OperationResponse,
};

fn reply(status: StatusCode, body: ApiResponse) -> Response {
    (status, Json(body)).into_response()
}

fn bad_request(message: &str) -> Response {
    reply(StatusCode::BAD_REQUEST, ApiResponse::error(400, message))
}

/// Tenant metadata of a delivery: the `meta` object when present, otherwise
/// the top-level object itself.
fn delivery_metadata(payload: &Value) -> Option<Metadata> {
    let object = payload.as_object()?;
    match object.get("meta") {
        Some(Value::Object(meta)) => Some(meta.clone()),
        _ => Some(object.clone()),
    }
}

fn error_status(err: &OperationError) -> StatusCode {
    match err {
        OperationError::Overloaded => StatusCode::SERVICE_UNAVAILABLE,
        OperationError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Accepts one chat message delivery.
pub async fn webhook_handler(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "failed to read webhook body");
            return bad_request("failed to read request body");
        }
    };
    if body.is_empty() {
        return bad_request("empty request body");
    }
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "invalid webhook JSON");
            return bad_request("invalid JSON body");
        }
    };

    let _guard = state.shutdown.in_flight_guard();

    let op = Operation::WebhookMessage {
        ctx: OperationContext::new(
            next_call_id(),
            service_names::WEBHOOK,
            state.server_config.operation_timeout_ms,
        ),
        meta: delivery_metadata(&payload),
        payload,
    };

    match state.pipeline.clone().oneshot(op).await {
        Ok(OperationResponse::Webhook(ack)) => reply(
            StatusCode::OK,
            ApiResponse::ok().with_data(json!({
                "robot_code": ack.robot_code,
                "database_bound": ack.database_bound,
            })),
        ),
        Ok(other) => {
            error!(response = ?other, "unexpected webhook response");
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                ApiResponse::error(500, "unexpected response"),
            )
        }
        Err(e) => {
            let status = error_status(&e);
            reply(status, ApiResponse::error(status.as_u16(), e.to_string()))
        }
    }
}

/// Any method other than POST on the webhook path.
pub async fn method_not_allowed_handler() -> Response {
    reply(
        StatusCode::METHOD_NOT_ALLOWED,
        ApiResponse::error(405, "method not allowed, only POST is supported"),
    )
}
