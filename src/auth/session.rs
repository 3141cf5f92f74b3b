//! Session cookie resolution for browser callers.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::auth::context::{AuthMethod, AuthenticatedSubject};
use crate::auth::cookie::verify_signed_cookie;
use crate::auth::error::AuthError;
use crate::auth::store::{SessionStore, bounded_lookup};

/// Resolves a signed session cookie into the subject that owns the session.
#[derive(Clone)]
pub struct SessionResolver {
    store: Arc<dyn SessionStore>,
    lookup_timeout: Duration,
}

impl SessionResolver {
    pub fn new(store: Arc<dyn SessionStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Resolve a cookie value against the current time.
    pub async fn resolve(
        &self,
        cookie_value: &str,
        secret: &str,
    ) -> Result<AuthenticatedSubject, AuthError> {
        self.resolve_at(cookie_value, secret, Utc::now()).await
    }

    /// Resolve a cookie value as of `now`.
    ///
    /// Format and signature failures from the cookie codec propagate
    /// unchanged; the store is only consulted for a verified token.
    pub async fn resolve_at(
        &self,
        cookie_value: &str,
        secret: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedSubject, AuthError> {
        if cookie_value.is_empty() {
            return Err(AuthError::MissingCookie);
        }

        let token = verify_signed_cookie(cookie_value, secret)?;

        let session = bounded_lookup(self.lookup_timeout, self.store.find_by_token(&token))
            .await?
            .ok_or(AuthError::SessionNotFound)?;

        if session.expires_at < now {
            return Err(AuthError::SessionExpired);
        }

        debug!(subject = %session.user_id, "Session verified");

        Ok(AuthenticatedSubject::new(session.user_id, AuthMethod::Session))
    }
}
