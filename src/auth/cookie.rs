//! Signed session cookie codec.
//!
//! The session issuer writes cookies as `<payload>.<signature>` where the
//! signature is an HMAC-SHA256 of the payload. Issuers and proxies disagree on
//! how the signature bytes are encoded, so decoding accepts standard padded
//! base64 first and URL-safe unpadded base64 second, optionally
//! percent-encoded on top.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};

use crate::auth::error::AuthError;
use crate::auth::signature;
use crate::types::SessionToken;

/// Separator between payload and signature.
pub const DELIMITER: char = '.';

/// A cookie value split into its two segments, not yet verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    payload: String,
    signature: String,
}

impl SignedToken {
    /// Split a raw cookie value into payload and signature text.
    ///
    /// Fails with `InvalidFormat` unless there is exactly one delimiter and
    /// the payload is non-empty.
    pub fn parse(cookie_value: &str) -> Result<Self, AuthError> {
        let mut parts = cookie_value.split(DELIMITER);
        let (Some(payload), Some(signature), None) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(AuthError::InvalidFormat);
        };

        if payload.is_empty() {
            return Err(AuthError::InvalidFormat);
        }

        Ok(Self {
            payload: payload.to_string(),
            signature: unescape_signature(signature).into_owned(),
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Verify the signature under `secret` and hand back the session token.
    ///
    /// Both base64 variants are tried in order. `UndecodableSignature` means
    /// neither variant could decode the text; `InvalidSignature` means at
    /// least one did but no decoded form verified.
    pub fn verify(self, secret: &str) -> Result<SessionToken, AuthError> {
        let mut decoded_any = false;

        if let Ok(bytes) = STANDARD.decode(&self.signature) {
            decoded_any = true;
            if signature::verify(&self.payload, secret, &bytes) {
                return Ok(SessionToken::new(self.payload));
            }
        }

        if let Ok(bytes) = URL_SAFE_NO_PAD.decode(&self.signature) {
            decoded_any = true;
            if signature::verify(&self.payload, secret, &bytes) {
                return Ok(SessionToken::new(self.payload));
            }
        }

        if decoded_any {
            Err(AuthError::InvalidSignature)
        } else {
            Err(AuthError::UndecodableSignature)
        }
    }
}

/// Parse and verify a signed cookie in one step.
pub fn verify_signed_cookie(cookie_value: &str, secret: &str) -> Result<SessionToken, AuthError> {
    SignedToken::parse(cookie_value)?.verify(secret)
}

/// Percent-decode the signature, keeping the raw text if that fails.
///
/// `+` is left alone: it is part of the standard base64 alphabet.
fn unescape_signature(raw: &str) -> Cow<'_, str> {
    // More lenient than form decoding, which would turn `+` into a space.
    urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw))
}
