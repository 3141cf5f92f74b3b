//! Request authentication and identity resolution.
//!
//! Every inbound request passes through the [`Gatekeeper`] before reaching a
//! handler. Two independent trust mechanisms are supported:
//!
//! - **API Key**: `X-API-Key` header, for service-to-service webhook routes.
//!   Keys are hashed and looked up by hash; disabled and expired keys are
//!   rejected.
//! - **Session**: a `payload.signature` cookie signed with HMAC-SHA256 by the
//!   external session issuer. The verified payload is the session token,
//!   which must name a live session.
//!
//! ## Security Model
//!
//! - The route decides which credential is read; the other one is ignored
//! - Client-supplied identity is never trusted directly
//! - Rejections are logged with their specific reason but clients only see a
//!   generic 401 (or a 5xx when a credential store is down)
//! - Raw API keys and secrets never reach the logs
//!
//! ## Usage
//!
//! ```ignore
//! let gatekeeper = Gatekeeper::new(config, api_key_store, session_store);
//! let app = Router::new()
//!     .route("/api/me", get(me))
//!     .layer(middleware::from_fn_with_state(gatekeeper, auth_middleware));
//!
//! async fn me(subject: AuthenticatedSubject) -> String {
//!     subject.subject_id().to_string()
//! }
//! ```

mod api_key;
mod context;
pub mod cookie;
mod error;
mod gatekeeper;
mod routes;
mod session;
pub mod signature;
mod store;


pub use api_key::{ApiKeyResolver, hash_api_key};
pub use context::{AuthMethod, AuthenticatedSubject, SubjectRejection};
pub use cookie::{SignedToken, verify_signed_cookie};
pub use error::{AuthError, AuthErrorKind, ErrorBody};
pub use gatekeeper::{
    AuthConfig, DEFAULT_API_KEY_HEADER, DEFAULT_LOOKUP_TIMEOUT_SECS, DEV_COOKIE_NAME, Gatekeeper,
    PRODUCTION_COOKIE_NAME, auth_middleware,
};
pub use routes::{RouteClass, RoutePolicy};
pub use session::SessionResolver;
pub use store::{
    ApiKeyRecord, ApiKeyStore, InMemoryApiKeyStore, InMemorySessionStore, SessionRecord,
    SessionStore,
};
