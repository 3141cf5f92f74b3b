use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Origins allowed by CORS when none are configured.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://access.soldbyghost.com",
    "https://app.soldbyghost.com",
    "http://localhost:3000",
];

/// Default overall deadline for a request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// A secret string that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Build a secret, refusing empty values.
    pub fn non_empty(value: impl Into<String>, name: &str) -> anyhow::Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(anyhow::anyhow!("{} must not be empty", name));
        }
        Ok(Self(value))
    }

    /// Access the raw secret.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(****)")
    }
}

impl From<String> for Secret {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Local development mode (plain cookie name, no `__Secure-` prefix)
    pub dev: bool,
    /// Origins allowed to make credentialed cross-origin requests
    pub allowed_origins: Vec<String>,
    /// Deadline for a whole request, gatekeeper included
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            dev: false,
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| o.to_string())
        .collect()
}
