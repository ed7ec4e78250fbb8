//! Operator endpoints for the tenant pool cache.
//!
//! Mounted under `/admin`; expected to be reachable only from the internal
//! network.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use robot_mcp_core::ApiResponse;
use serde_json::json;
use tracing::info;

use super::AppState;

/// `GET /admin/tenants`: robot codes with a cached pool.
pub async fn list_tenants_handler(State(state): State<AppState>) -> Json<ApiResponse> {
    Json(ApiResponse::ok().with_data(json!({ "tenants": state.registry.cached_tenants() })))
}

/// `DELETE /admin/tenants/{robot_code}`: closes the tenant's pool so the next
/// request reconnects. 404 when the tenant has no cached pool.
pub async fn evict_tenant_handler(
    State(state): State<AppState>,
    Path(robot_code): Path<String>,
) -> Response {
    if state.registry.evict(&robot_code).await {
        info!(robot_code = %robot_code, "tenant pool evicted by operator");
        let body = ApiResponse::ok().with_data(json!({ "robot_code": robot_code }));
        (StatusCode::OK, Json(body)).into_response()
    } else {
        let body = ApiResponse::error(404, format!("no cached pool for tenant {robot_code}"));
        (StatusCode::NOT_FOUND, Json(body)).into_response()
    }
}
