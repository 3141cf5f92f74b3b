// HTTP surface: router assembly and the few handlers the gatekeeper owns.

pub mod logging;

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware,
    response::Json,
    routing::get,
};
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::auth::{AuthenticatedSubject, Gatekeeper, auth_middleware};
use crate::config::ServerConfig;

pub use logging::{REQUEST_ID_HEADER, request_log};

/// Wrap `app` (the business routes) with the gatekeeper and the ambient
/// layers, and add `/health` and `/api/me`.
///
/// Layer order, outermost first: trace, CORS, timeout, request log,
/// gatekeeper. CORS pre-flights are answered before authentication runs.
pub fn create_router(app: Router, gatekeeper: Gatekeeper, server: &ServerConfig) -> Router {
    app.route("/health", get(health_check))
        .route("/api/me", get(current_subject))
        .layer(middleware::from_fn_with_state(gatekeeper, auth_middleware))
        .layer(middleware::from_fn(request_log))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&server.allowed_origins))
                .layer(TimeoutLayer::new(server.request_timeout)),
        )
}

/// Credentialed CORS for the configured origins.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-api-key"),
        ])
        .allow_credentials(true)
}

async fn health_check() -> Result<Json<Value>, StatusCode> {
    Ok(Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Echo the identity the gatekeeper attached to this request.
async fn current_subject(subject: AuthenticatedSubject) -> Json<Value> {
    Json(serde_json::json!({
        "user_id": subject.subject_id().to_string(),
        "method": subject.method().as_str(),
    }))
}
