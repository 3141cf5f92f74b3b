//! Request gatekeeper: every inbound request passes through here.
//!
//! The route is classified first, then only the credential belonging to
//! that class is extracted and resolved. A resolved subject is attached to
//! the request extensions; any failure short-circuits with a generic error
//! response while the specific reason goes to the log.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, error, warn};

use crate::auth::api_key::{ApiKeyResolver, hash_api_key};
use crate::auth::context::AuthenticatedSubject;
use crate::auth::error::{AuthError, AuthErrorKind};
use crate::auth::routes::{RouteClass, RoutePolicy};
use crate::auth::session::SessionResolver;
use crate::auth::store::{ApiKeyStore, SessionStore};
use crate::config::{Secret, ServerConfig};

/// Session cookie name behind HTTPS.
pub const PRODUCTION_COOKIE_NAME: &str = "__Secure-crm.session_token";

/// Session cookie name in local development (no `__Secure-` prefix).
pub const DEV_COOKIE_NAME: &str = "crm.session_token";

/// Header carrying service API keys.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Default deadline for a single credential store lookup.
pub const DEFAULT_LOOKUP_TIMEOUT_SECS: u64 = 5;

/// Authentication configuration, fixed for the life of the process.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret the session issuer signs cookies with
    pub session_secret: Secret,
    /// Name of the session cookie
    pub session_cookie_name: String,
    /// Header name for API key authentication
    pub api_key_header: String,
    /// Public and webhook route layout
    pub routes: RoutePolicy,
    /// Deadline for each store lookup
    pub lookup_timeout: Duration,
}

impl AuthConfig {
    /// Create a production config.
    pub fn new(session_secret: impl Into<Secret>) -> Self {
        Self::for_mode(session_secret, false)
    }

    /// Create a config for production or local development.
    pub fn for_mode(session_secret: impl Into<Secret>, dev: bool) -> Self {
        let session_cookie_name = if dev {
            DEV_COOKIE_NAME
        } else {
            PRODUCTION_COOKIE_NAME
        };

        Self {
            session_secret: session_secret.into(),
            session_cookie_name: session_cookie_name.to_string(),
            api_key_header: DEFAULT_API_KEY_HEADER.to_string(),
            routes: RoutePolicy::default(),
            lookup_timeout: Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS),
        }
    }

    /// Create a config matching the server's dev mode.
    pub fn for_server(session_secret: impl Into<Secret>, server: &ServerConfig) -> Self {
        Self::for_mode(session_secret, server.dev)
    }

    pub fn with_routes(mut self, routes: RoutePolicy) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_lookup_timeout(mut self, lookup_timeout: Duration) -> Self {
        self.lookup_timeout = lookup_timeout;
        self
    }
}

/// Stateless request authenticator. Cheap to clone.
#[derive(Clone)]
pub struct Gatekeeper {
    config: Arc<AuthConfig>,
    api_keys: ApiKeyResolver,
    sessions: SessionResolver,
}

impl Gatekeeper {
    /// Create a new gatekeeper over the given credential stores.
    pub fn new(
        config: AuthConfig,
        api_key_store: Arc<dyn ApiKeyStore>,
        session_store: Arc<dyn SessionStore>,
    ) -> Self {
        let api_keys = ApiKeyResolver::new(api_key_store, config.lookup_timeout);
        let sessions = SessionResolver::new(session_store, config.lookup_timeout);
        Self {
            config: Arc::new(config),
            api_keys,
            sessions,
        }
    }

    /// Authenticate a request from its method, path and headers.
    ///
    /// Returns `Ok(None)` for public routes, `Ok(Some(subject))` for a
    /// verified credential and `Err` otherwise. Failures are logged here.
    pub async fn authenticate(
        &self,
        method: &Method,
        path: &str,
        headers: &HeaderMap,
    ) -> Result<Option<AuthenticatedSubject>, AuthError> {
        match self.config.routes.classify(method, path) {
            RouteClass::Public => {
                debug!(%method, path, "Public route, skipping authentication");
                Ok(None)
            }
            RouteClass::ApiKeyGuarded => {
                let raw_key = api_key_from_headers(headers, &self.config.api_key_header);
                let result = match &raw_key {
                    Ok(key) => self.api_keys.resolve(key).await,
                    Err(e) => Err(e.clone()),
                };
                result.map(Some).inspect_err(|err| {
                    let key_hash_prefix = raw_key
                        .as_ref()
                        .ok()
                        .filter(|k| !k.is_empty())
                        .map(|k| hash_api_key(k).log_prefix().to_string());
                    log_rejection(err, method, path, key_hash_prefix.as_deref());
                })
            }
            RouteClass::SessionGuarded => {
                let result = match session_cookie(headers, &self.config.session_cookie_name) {
                    Some(value) => {
                        self.sessions
                            .resolve(value, self.config.session_secret.expose())
                            .await
                    }
                    None => Err(AuthError::MissingCookie),
                };
                result
                    .map(Some)
                    .inspect_err(|err| log_rejection(err, method, path, None))
            }
        }
    }
}

/// Axum middleware running the gatekeeper in front of the router.
pub async fn auth_middleware(
    State(gatekeeper): State<Gatekeeper>,
    mut req: Request,
    next: Next,
) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match gatekeeper.authenticate(&method, &path, req.headers()).await {
        Ok(Some(subject)) => {
            req.extensions_mut().insert(subject);
            next.run(req).await
        }
        Ok(None) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

fn api_key_from_headers<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, AuthError> {
    match headers.get(name) {
        None => Err(AuthError::MissingKey),
        Some(value) => value.to_str().map_err(|_| AuthError::InvalidKey),
    }
}

/// Find a cookie by name across all `Cookie` headers.
fn session_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(cookie_name, _)| *cookie_name == name)
        .map(|(_, value)| {
            value
                .strip_prefix('"')
                .and_then(|v| v.strip_suffix('"'))
                .unwrap_or(value)
        })
}

fn log_rejection(err: &AuthError, method: &Method, path: &str, key_hash_prefix: Option<&str>) {
    let kind = err.kind();
    if kind == AuthErrorKind::UpstreamUnavailable {
        error!(
            %kind,
            reason = %err,
            %method,
            path,
            key_hash_prefix,
            "Authentication failed: credential store unavailable"
        );
    } else {
        warn!(
            %kind,
            reason = %err,
            %method,
            path,
            key_hash_prefix,
            "Request rejected by gatekeeper"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{InMemoryApiKeyStore, InMemorySessionStore};
    use axum::http::HeaderValue;

    fn gatekeeper() -> Gatekeeper {
        Gatekeeper::new(
            AuthConfig::new("secret"),
            Arc::new(InMemoryApiKeyStore::new()),
            Arc::new(InMemorySessionStore::new()),
        )
    }

    #[test]
    fn test_auth_config_modes() {
        let prod = AuthConfig::new("s");
        assert_eq!(prod.session_cookie_name, PRODUCTION_COOKIE_NAME);
        assert_eq!(prod.api_key_header, "X-API-Key");
        assert_eq!(prod.lookup_timeout, Duration::from_secs(DEFAULT_LOOKUP_TIMEOUT_SECS));

        let dev = AuthConfig::for_mode("s", true);
        assert_eq!(dev.session_cookie_name, DEV_COOKIE_NAME);
    }

    #[test]
    fn test_auth_config_follows_server_dev_mode() {
        let mut server = ServerConfig::default();
        assert_eq!(
            AuthConfig::for_server("s", &server).session_cookie_name,
            PRODUCTION_COOKIE_NAME
        );

        server.dev = true;
        assert_eq!(
            AuthConfig::for_server("s", &server).session_cookie_name,
            DEV_COOKIE_NAME
        );
    }

    #[test]
    fn test_auth_config_debug_redacts_secret() {
        let config = AuthConfig::new("super-secret-value");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret-value"));
    }

    #[test]
    fn test_session_cookie_lookup() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; crm.session_token=abc.def"),
        );
        assert_eq!(session_cookie(&headers, DEV_COOKIE_NAME), Some("abc.def"));
        assert_eq!(session_cookie(&headers, PRODUCTION_COOKIE_NAME), None);
    }

    #[test]
    fn test_session_cookie_across_headers_and_quotes() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("a=1"));
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("__Secure-crm.session_token=\"tok.sig\""),
        );
        assert_eq!(
            session_cookie(&headers, PRODUCTION_COOKIE_NAME),
            Some("tok.sig")
        );
    }

    #[test]
    fn test_session_cookie_value_keeps_equals() {
        let mut headers = HeaderMap::new();
        headers.append(
            header::COOKIE,
            HeaderValue::from_static("crm.session_token=tok.c2ln=="),
        );
        assert_eq!(session_cookie(&headers, DEV_COOKIE_NAME), Some("tok.c2ln=="));
    }

    #[test]
    fn test_api_key_header_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("raw"));
        assert_eq!(api_key_from_headers(&headers, "X-API-Key"), Ok("raw"));
        assert_eq!(
            api_key_from_headers(&HeaderMap::new(), "X-API-Key"),
            Err(AuthError::MissingKey)
        );
    }

    #[tokio::test]
    async fn test_public_route_yields_no_subject() {
        let gk = gatekeeper();
        let result = gk
            .authenticate(&Method::GET, "/api/verify", &HeaderMap::new())
            .await;
        assert_eq!(result, Ok(None));
    }

    #[tokio::test]
    async fn test_webhook_route_ignores_session_cookie() {
        let gk = gatekeeper();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("__Secure-crm.session_token=tok.sig"),
        );
        let err = gk
            .authenticate(&Method::POST, "/webhooks/landing-page-form", &headers)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingKey);
    }

    #[tokio::test]
    async fn test_session_route_ignores_api_key() {
        let gk = gatekeeper();
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_static("raw"));
        let err = gk
            .authenticate(&Method::GET, "/api/contacts", &headers)
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::MissingCookie);
    }
}
