//! Transport middleware shared by the webhook, health and MCP routes.
//!
//! Operation-level concerns (load shedding, deadlines, tenant binding) are
//! handled by `service::middleware`, not here.

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::NetworkConfig;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");
const MCP_SESSION_HEADER: HeaderName = HeaderName::from_static("mcp-session-id");

/// Wraps every route of `router` in the HTTP stack.
///
/// Outermost first: request id assignment, trace span, gzip, CORS, request
/// deadline (408), then request id echo on the response.
pub fn apply_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(REQUEST_ID_HEADER, MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors_for(&config.cors_origins))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(REQUEST_ID_HEADER)),
    )
}

/// `"*"` anywhere in the list opens CORS to every origin; unparsable
/// entries are skipped.
fn cors_for(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse().ok()))
    };

    // MCP clients close sessions with DELETE and read the session id back
    // from a response header.
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any)
        .expose_headers([MCP_SESSION_HEADER])
}
