//! Per-request access logging.

use std::net::SocketAddr;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

/// Response header echoing the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Assign a request id, then log method, path, status and latency once the
/// response is ready. Failed requests (status >= 400) log at error level.
///
/// Everything logged further down the stack (gatekeeper rejections included)
/// runs inside a `request` span carrying the same id.
pub async fn request_log(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let request_id = Uuid::new_v4();

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = client_ip(req.headers(), peer);

    let mut response = next
        .run(req)
        .instrument(info_span!("request", %request_id))
        .await;

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status >= 400 {
        error!(
            %request_id,
            %method,
            path = %path,
            status,
            duration_ms,
            client_ip = %client_ip,
            "Request failed"
        );
    } else {
        info!(
            %request_id,
            %method,
            path = %path,
            status,
            duration_ms,
            client_ip = %client_ip,
            "Request processed"
        );
    }

    response
}

/// Best-effort client address behind a load balancer.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(|ip| ip.to_string())
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}
