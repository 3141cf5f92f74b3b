// SurrealDB-backed credential stores.
//
// The gatekeeper only reads; rows are written by the session issuer and by
// account administration. The insert helpers are for fixtures.

use anyhow::Result;
use async_trait::async_trait;

use crate::auth::{ApiKeyRecord, ApiKeyStore, SessionRecord, SessionStore};
use crate::db::Db;
use crate::db::schema::{ApiKeyRow, SessionRow};
use crate::types::{ApiKeyHash, SessionToken};

/// API keys looked up by hash in the `api_key` table.
#[derive(Clone)]
pub struct SurrealApiKeyStore {
    db: Db,
}

impl SurrealApiKeyStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Store an API key record.
    pub async fn insert(&self, record: &ApiKeyRecord) -> Result<()> {
        self.db
            .query("CREATE api_key CONTENT $row")
            .bind(("row", ApiKeyRow::from(record)))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl ApiKeyStore for SurrealApiKeyStore {
    async fn find_by_hash(&self, key_hash: &ApiKeyHash) -> Result<Option<ApiKeyRecord>> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT key_hash, user_id, enabled, expires_at
                FROM api_key
                WHERE key_hash = $key_hash
                LIMIT 1
                "#,
            )
            .bind(("key_hash", key_hash.as_str().to_string()))
            .await?;

        let rows: Vec<ApiKeyRow> = res.take(0)?;
        rows.into_iter().next().map(ApiKeyRecord::try_from).transpose()
    }
}

/// Browser sessions looked up by token in the `session` table.
#[derive(Clone)]
pub struct SurrealSessionStore {
    db: Db,
}

impl SurrealSessionStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Store a session record.
    pub async fn insert(&self, record: &SessionRecord) -> Result<()> {
        self.db
            .query("CREATE session CONTENT $row")
            .bind(("row", SessionRow::from(record)))
            .await?
            .check()?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SurrealSessionStore {
    async fn find_by_token(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        let mut res = self
            .db
            .query(
                r#"
                SELECT token, user_id, expires_at
                FROM session
                WHERE token = $token
                LIMIT 1
                "#,
            )
            .bind(("token", token.as_str().to_string()))
            .await?;

        let rows: Vec<SessionRow> = res.take(0)?;
        rows.into_iter().next().map(SessionRecord::try_from).transpose()
    }
}
