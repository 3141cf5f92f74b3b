//! Request-scoped identity produced by the gatekeeper.

use std::fmt;

use axum::Json;
use axum::extract::FromRequestParts;
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::error::{ErrorBody, UNAUTHORIZED_MESSAGE};
use crate::types::SubjectId;

/// Which trust path authenticated the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    ApiKey,
    Session,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
            Self::Session => "session",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verified identity attached to a request.
///
/// Only the gatekeeper constructs this, and only after a credential has been
/// verified against a secret or a live, enabled record. It is immutable once
/// created and lives in the request extensions for the rest of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedSubject {
    subject_id: SubjectId,
    method: AuthMethod,
}

impl AuthenticatedSubject {
    pub(crate) fn new(subject_id: SubjectId, method: AuthMethod) -> Self {
        Self { subject_id, method }
    }

    /// The authenticated user's id.
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    pub fn method(&self) -> AuthMethod {
        self.method
    }
}

/// Rejection when a handler asks for a subject the request does not carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectRejection;

impl fmt::Display for SubjectRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No authenticated subject on request")
    }
}

impl std::error::Error for SubjectRejection {}

impl IntoResponse for SubjectRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new(UNAUTHORIZED_MESSAGE)),
        )
            .into_response()
    }
}

impl<S> FromRequestParts<S> for AuthenticatedSubject
where
    S: Send + Sync,
{
    type Rejection = SubjectRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedSubject>()
            .cloned()
            .ok_or_else(|| {
                tracing::error!(
                    path = %parts.uri.path(),
                    "Handler requires an authenticated subject but none was attached"
                );
                SubjectRejection
            })
    }
}
