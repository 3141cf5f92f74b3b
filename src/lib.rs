pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod types;

// Re-export key types and functions
pub use api::create_router;
pub use auth::{
    AuthConfig, AuthError, AuthMethod, AuthenticatedSubject, Gatekeeper, auth_middleware,
    hash_api_key,
};
pub use config::{Secret, ServerConfig};
pub use db::{
    DatabaseConfig, Db, SurrealApiKeyStore, SurrealSessionStore, create_connection, ensure_schema,
};
pub use types::{ApiKeyHash, SessionToken, SubjectId};

use std::sync::Arc;

/// Build a gatekeeper reading credentials from `db`.
///
/// The credential tables belong to the session issuer and key
/// administration; nothing here defines or alters them (see `init`).
pub fn create_gatekeeper(config: AuthConfig, db: Db) -> Gatekeeper {
    Gatekeeper::new(
        config,
        Arc::new(SurrealApiKeyStore::new(db.clone())),
        Arc::new(SurrealSessionStore::new(db)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::signature::sign;
    use axum::http::{HeaderMap, HeaderValue, Method, header};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    async fn issuer_db() -> Db {
        let config = DatabaseConfig {
            url: "memory".to_string(),
            namespace: "issuer".to_string(),
            database: "auth".to_string(),
            username: None,
            password: None,
        };
        create_connection(config).await.unwrap()
    }

    #[tokio::test]
    async fn test_gatekeeper_leaves_issuer_tables_alone() {
        let db = issuer_db().await;
        let user = Uuid::new_v4().to_string();
        let expires_at = (Utc::now() + Duration::hours(1)).to_rfc3339();
        // Data the unique token index would reject
        for _ in 0..2 {
            db.query("CREATE session SET token = 'dup', user_id = $user, expires_at = $expires_at")
                .bind(("user", user.clone()))
                .bind(("expires_at", expires_at.clone()))
                .await
                .unwrap()
                .check()
                .unwrap();
        }

        let gatekeeper = create_gatekeeper(AuthConfig::new("secret"), db.clone());

        let cookie = format!(
            "{}=dup.{}",
            crate::auth::PRODUCTION_COOKIE_NAME,
            STANDARD.encode(sign("dup", "secret"))
        );
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(&cookie).unwrap());
        let subject = gatekeeper
            .authenticate(&Method::GET, "/api/contacts", &headers)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(subject.subject_id().to_string(), user);

        // Still no unique index: a third duplicate is accepted.
        db.query("CREATE session SET token = 'dup', user_id = $user, expires_at = $expires_at")
            .bind(("user", user))
            .bind(("expires_at", expires_at))
            .await
            .unwrap()
            .check()
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_schema_refuses_duplicate_tokens() {
        let db = issuer_db().await;
        for _ in 0..2 {
            db.query("CREATE session SET token = 'dup'")
                .await
                .unwrap()
                .check()
                .unwrap();
        }
        assert!(ensure_schema(&db).await.is_err());
    }
}
