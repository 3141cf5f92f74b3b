//! API key hashing and resolution for service-to-service callers.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::auth::context::{AuthMethod, AuthenticatedSubject};
use crate::auth::error::AuthError;
use crate::auth::store::{ApiKeyStore, bounded_lookup};
use crate::types::ApiKeyHash;

/// Hash an API key for storage and lookup (don't store raw keys).
///
/// SHA-256 of the key bytes, base64url encoded without padding.
pub fn hash_api_key(key: &str) -> ApiKeyHash {
    let digest = Sha256::digest(key.as_bytes());
    ApiKeyHash::new(URL_SAFE_NO_PAD.encode(digest))
}

/// Resolves a raw API key into the subject that owns it.
#[derive(Clone)]
pub struct ApiKeyResolver {
    store: Arc<dyn ApiKeyStore>,
    lookup_timeout: Duration,
}

impl ApiKeyResolver {
    pub fn new(store: Arc<dyn ApiKeyStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Resolve a raw key against the current time.
    pub async fn resolve(&self, raw_key: &str) -> Result<AuthenticatedSubject, AuthError> {
        self.resolve_at(raw_key, Utc::now()).await
    }

    /// Resolve a raw key as of `now`.
    ///
    /// Checks run in a fixed order and the first failure wins: missing,
    /// unknown, disabled, expired.
    pub async fn resolve_at(
        &self,
        raw_key: &str,
        now: DateTime<Utc>,
    ) -> Result<AuthenticatedSubject, AuthError> {
        if raw_key.is_empty() {
            return Err(AuthError::MissingKey);
        }

        let key_hash = hash_api_key(raw_key);

        let record = bounded_lookup(self.lookup_timeout, self.store.find_by_hash(&key_hash))
            .await?
            .ok_or(AuthError::InvalidKey)?;

        if !record.enabled {
            return Err(AuthError::DisabledKey);
        }

        if let Some(expires_at) = record.expires_at
            && expires_at < now
        {
            return Err(AuthError::ExpiredKey);
        }

        debug!(
            key_hash_prefix = key_hash.log_prefix(),
            subject = %record.user_id,
            "API key verified"
        );

        Ok(AuthenticatedSubject::new(record.user_id, AuthMethod::ApiKey))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::store::{ApiKeyRecord, InMemoryApiKeyStore};
    use crate::types::SubjectId;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;
    use uuid::Uuid;

    const RAW_KEY: &str = "crm_live_5c1f0a9e7b2d4c3a";

    async fn resolver_with(record: Option<ApiKeyRecord>) -> ApiKeyResolver {
        let store = InMemoryApiKeyStore::new();
        if let Some(record) = record {
            store.insert(record).await;
        }
        ApiKeyResolver::new(Arc::new(store), Duration::from_secs(1))
    }

    fn record(enabled: bool, expires_at: Option<DateTime<Utc>>) -> ApiKeyRecord {
        ApiKeyRecord {
            key_hash: hash_api_key(RAW_KEY),
            user_id: SubjectId::new(Uuid::new_v4()),
            enabled,
            expires_at,
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ApiKeyStore for FailingStore {
        async fn find_by_hash(&self, _key_hash: &ApiKeyHash) -> Result<Option<ApiKeyRecord>> {
            Err(anyhow::anyhow!("connection reset by peer"))
        }
    }

    #[test]
    fn test_hash_api_key() {
        let hash1 = hash_api_key("secret123");
        let hash2 = hash_api_key("secret123");
        let hash3 = hash_api_key("different");

        assert_eq!(hash1, hash2); // Same input = same output
        assert_ne!(hash1, hash3); // Different input = different output

        // 32 bytes -> 43 base64url chars, no padding
        assert_eq!(hash1.as_str().len(), 43);
        assert!(
            hash1
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_hash_api_key_known_vector() {
        // sha256("") = e3b0c442...b855
        assert_eq!(
            hash_api_key("").as_str(),
            "47DEQpj8HBSa-_TImW-5JCeuQeRkm5NMpJWZG3hSuFU"
        );
    }

    #[tokio::test]
    async fn test_valid_key_resolves_to_owner() {
        let rec = record(true, Some(Utc::now() + ChronoDuration::days(30)));
        let owner = rec.user_id;
        let resolver = resolver_with(Some(rec)).await;

        let subject = resolver.resolve(RAW_KEY).await.unwrap();
        assert_eq!(subject.subject_id(), owner);
        assert_eq!(subject.method(), AuthMethod::ApiKey);
    }

    #[tokio::test]
    async fn test_key_without_expiry_resolves() {
        let resolver = resolver_with(Some(record(true, None))).await;
        assert!(resolver.resolve(RAW_KEY).await.is_ok());
    }

    #[tokio::test]
    async fn test_empty_key_is_missing() {
        let resolver = resolver_with(None).await;
        assert_eq!(resolver.resolve("").await.unwrap_err(), AuthError::MissingKey);
    }

    #[tokio::test]
    async fn test_unknown_key_is_invalid() {
        let resolver = resolver_with(Some(record(true, None))).await;
        assert_eq!(
            resolver.resolve("crm_live_wrong").await.unwrap_err(),
            AuthError::InvalidKey
        );
    }

    #[tokio::test]
    async fn test_disabled_key() {
        let resolver = resolver_with(Some(record(false, None))).await;
        assert_eq!(
            resolver.resolve(RAW_KEY).await.unwrap_err(),
            AuthError::DisabledKey
        );
    }

    #[tokio::test]
    async fn test_expired_key() {
        let resolver =
            resolver_with(Some(record(true, Some(Utc::now() - ChronoDuration::seconds(1))))).await;
        assert_eq!(
            resolver.resolve(RAW_KEY).await.unwrap_err(),
            AuthError::ExpiredKey
        );
    }

    #[tokio::test]
    async fn test_disabled_wins_over_expired() {
        let resolver =
            resolver_with(Some(record(false, Some(Utc::now() - ChronoDuration::days(1))))).await;
        let err = resolver.resolve(RAW_KEY).await.unwrap_err();
        assert_eq!(err, AuthError::DisabledKey);
        assert_eq!(
            err.kind(),
            crate::auth::error::AuthErrorKind::DisabledCredential
        );
    }

    #[tokio::test]
    async fn test_expiry_boundary_is_evaluated_at_resolution_time() {
        let expires_at = Utc::now();
        let resolver = resolver_with(Some(record(true, Some(expires_at)))).await;

        assert!(resolver.resolve_at(RAW_KEY, expires_at).await.is_ok());
        assert_eq!(
            resolver
                .resolve_at(RAW_KEY, expires_at + ChronoDuration::milliseconds(1))
                .await
                .unwrap_err(),
            AuthError::ExpiredKey
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_upstream() {
        let resolver = ApiKeyResolver::new(Arc::new(FailingStore), Duration::from_secs(1));
        let err = resolver.resolve(RAW_KEY).await.unwrap_err();
        assert!(matches!(err, AuthError::StoreUnavailable(_)));
    }
}
