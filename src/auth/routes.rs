//! Route classification: which trust path applies to a request.

use axum::http::Method;
use serde::{Deserialize, Serialize};

/// Prefix for service-to-service webhook endpoints.
pub const DEFAULT_WEBHOOK_PREFIX: &str = "/webhooks/";

/// Paths reachable without any credential.
pub const DEFAULT_PUBLIC_PATHS: &[&str] = &["/health", "/api/verify", "/api/resend-verification"];

/// Trust path for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// No authentication
    Public,
    /// `X-API-Key` header required
    ApiKeyGuarded,
    /// Signed session cookie required
    SessionGuarded,
}

/// Which paths are public and which belong to webhooks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutePolicy {
    /// Exact paths that bypass authentication
    #[serde(default = "default_public_paths")]
    pub public_paths: Vec<String>,
    /// Path prefix that switches to API key authentication
    #[serde(default = "default_webhook_prefix")]
    pub webhook_prefix: String,
}

fn default_public_paths() -> Vec<String> {
    DEFAULT_PUBLIC_PATHS.iter().map(|p| p.to_string()).collect()
}

fn default_webhook_prefix() -> String {
    DEFAULT_WEBHOOK_PREFIX.to_string()
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            public_paths: default_public_paths(),
            webhook_prefix: default_webhook_prefix(),
        }
    }
}

impl RoutePolicy {
    /// Classify a request. Pre-flight `OPTIONS` requests are always public.
    pub fn classify(&self, method: &Method, path: &str) -> RouteClass {
        if *method == Method::OPTIONS || self.public_paths.iter().any(|p| p == path) {
            return RouteClass::Public;
        }

        if path.starts_with(&self.webhook_prefix) {
            return RouteClass::ApiKeyGuarded;
        }

        RouteClass::SessionGuarded
    }
}
