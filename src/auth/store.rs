//! Credential lookup contracts.
//!
//! The gatekeeper never writes credential state. It only needs to find an API
//! key by its hash and a session by its token; everything else about how keys
//! and sessions are created lives outside this crate.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::auth::error::AuthError;
use crate::types::{ApiKeyHash, SessionToken, SubjectId};

/// Stored API key, looked up by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    /// Hash of the raw key (see [`crate::auth::hash_api_key`])
    pub key_hash: ApiKeyHash,
    /// Subject that owns this key
    pub user_id: SubjectId,
    /// Whether the key may be used
    pub enabled: bool,
    /// Optional expiration time
    pub expires_at: Option<DateTime<Utc>>,
}

/// Stored browser session, looked up by token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub token: SessionToken,
    pub user_id: SubjectId,
    pub expires_at: DateTime<Utc>,
}

/// Lookup contract for API keys.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Find a key by its hash. `Ok(None)` means no such key.
    async fn find_by_hash(&self, key_hash: &ApiKeyHash) -> Result<Option<ApiKeyRecord>>;
}

/// Lookup contract for sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Find a session by its token. `Ok(None)` means no such session.
    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<SessionRecord>>;
}

/// Run a store lookup under a deadline, mapping failures onto `AuthError`.
pub(crate) async fn bounded_lookup<T, F>(timeout: Duration, lookup: F) -> Result<T, AuthError>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, lookup).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AuthError::StoreUnavailable(e.to_string())),
        Err(_) => Err(AuthError::LookupTimedOut),
    }
}

/// In-process API key store for tests and local development.
#[derive(Default)]
pub struct InMemoryApiKeyStore {
    keys: RwLock<HashMap<ApiKeyHash, ApiKeyRecord>>,
}

impl InMemoryApiKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a key record.
    pub async fn insert(&self, record: ApiKeyRecord) {
        self.keys
            .write()
            .await
            .insert(record.key_hash.clone(), record);
    }
}

#[async_trait]
impl ApiKeyStore for InMemoryApiKeyStore {
    async fn find_by_hash(&self, key_hash: &ApiKeyHash) -> Result<Option<ApiKeyRecord>> {
        Ok(self.keys.read().await.get(key_hash).cloned())
    }
}

/// In-process session store for tests and local development.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionToken, SessionRecord>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a session record.
    pub async fn insert(&self, record: SessionRecord) {
        self.sessions
            .write()
            .await
            .insert(record.token.clone(), record);
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().await.get(token).cloned())
    }
}
