//! Authentication failure reasons and their client-facing mapping.
//!
//! `AuthError` carries the precise reason a credential was rejected. It is
//! logged server-side in full; the response a client sees only depends on
//! the coarse [`AuthErrorKind`] so that callers cannot tell a wrong key from
//! an expired or disabled one.

use std::fmt;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Generic message returned for every rejected credential.
pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";

/// Message returned when a credential store could not be consulted.
pub const UNAVAILABLE_MESSAGE: &str = "Authentication service unavailable";

/// Coarse failure taxonomy used for logging and status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthErrorKind {
    MissingCredential,
    MalformedCredential,
    InvalidCredential,
    DisabledCredential,
    ExpiredCredential,
    UpstreamUnavailable,
}

impl AuthErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedCredential => "malformed_credential",
            Self::InvalidCredential => "invalid_credential",
            Self::DisabledCredential => "disabled_credential",
            Self::ExpiredCredential => "expired_credential",
            Self::UpstreamUnavailable => "upstream_unavailable",
        }
    }
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No API key header, or an empty one
    MissingKey,
    /// No stored key matches the presented key's hash
    InvalidKey,
    /// Key exists but has been disabled
    DisabledKey,
    /// Key exists but its expiry has passed
    ExpiredKey,
    /// No session cookie on the request
    MissingCookie,
    /// Cookie is not exactly `payload.signature`
    InvalidFormat,
    /// Signature segment is not valid base64 in any accepted variant
    UndecodableSignature,
    /// Signature decodes but does not verify against the payload
    InvalidSignature,
    /// Verified session token has no stored session
    SessionNotFound,
    /// Stored session has expired
    SessionExpired,
    /// Credential store failed for infrastructure reasons
    StoreUnavailable(String),
    /// Credential store did not answer within the lookup timeout
    LookupTimedOut,
}

impl AuthError {
    /// Map this error onto the coarse taxonomy.
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            Self::MissingKey | Self::MissingCookie => AuthErrorKind::MissingCredential,
            Self::InvalidFormat | Self::UndecodableSignature => {
                AuthErrorKind::MalformedCredential
            }
            Self::InvalidKey | Self::InvalidSignature | Self::SessionNotFound => {
                AuthErrorKind::InvalidCredential
            }
            Self::DisabledKey => AuthErrorKind::DisabledCredential,
            Self::ExpiredKey | Self::SessionExpired => AuthErrorKind::ExpiredCredential,
            Self::StoreUnavailable(_) | Self::LookupTimedOut => AuthErrorKind::UpstreamUnavailable,
        }
    }

    /// HTTP status for the response. Only infrastructure failures are 5xx.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::LookupTimedOut => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Message safe to show to the client.
    pub fn public_message(&self) -> &'static str {
        if self.kind() == AuthErrorKind::UpstreamUnavailable {
            UNAVAILABLE_MESSAGE
        } else {
            UNAUTHORIZED_MESSAGE
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey => write!(f, "Missing API key"),
            Self::InvalidKey => write!(f, "Invalid API key"),
            Self::DisabledKey => write!(f, "Disabled API key"),
            Self::ExpiredKey => write!(f, "Expired API key"),
            Self::MissingCookie => write!(f, "Missing session cookie"),
            Self::InvalidFormat => write!(f, "Invalid session cookie format"),
            Self::UndecodableSignature => write!(f, "Undecodable session cookie signature"),
            Self::InvalidSignature => write!(f, "Invalid session cookie signature"),
            Self::SessionNotFound => write!(f, "Invalid session"),
            Self::SessionExpired => write!(f, "Session expired"),
            Self::StoreUnavailable(msg) => write!(f, "Credential store unavailable: {}", msg),
            Self::LookupTimedOut => write!(f, "Credential lookup timed out"),
        }
    }
}

impl std::error::Error for AuthError {}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::new(self.public_message()))).into_response()
    }
}
