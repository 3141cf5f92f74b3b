//! Credential tables as written by the external issuers.
//!
//! Rows are kept deliberately loose (strings for ids and timestamps) and
//! converted into the typed records at the boundary, so a malformed row
//! surfaces as a store error instead of a bogus identity.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{ApiKeyRecord, SessionRecord};
use crate::db::Db;
use crate::types::{ApiKeyHash, SessionToken, SubjectId};

/// Row shape of the `api_key` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRow {
    /// base64url SHA-256 of the raw key
    pub key_hash: String,
    /// Owning user id (UUID)
    pub user_id: String,
    /// Missing means enabled
    #[serde(default)]
    pub enabled: Option<bool>,
    /// RFC 3339 expiry, if any
    #[serde(default)]
    pub expires_at: Option<String>,
}

/// Row shape of the `session` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub token: String,
    pub user_id: String,
    pub expires_at: String,
}

impl TryFrom<ApiKeyRow> for ApiKeyRecord {
    type Error = anyhow::Error;

    fn try_from(row: ApiKeyRow) -> Result<Self> {
        let user_id = SubjectId::parse(&row.user_id)
            .with_context(|| format!("api_key row has malformed user_id {:?}", row.user_id))?;
        let expires_at = row.expires_at.as_deref().map(parse_timestamp).transpose()?;

        Ok(ApiKeyRecord {
            key_hash: ApiKeyHash::new(row.key_hash),
            user_id,
            enabled: row.enabled.unwrap_or(true),
            expires_at,
        })
    }
}

impl From<&ApiKeyRecord> for ApiKeyRow {
    fn from(record: &ApiKeyRecord) -> Self {
        Self {
            key_hash: record.key_hash.to_string(),
            user_id: record.user_id.to_string(),
            enabled: Some(record.enabled),
            expires_at: record.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self> {
        let user_id = SubjectId::parse(&row.user_id)
            .with_context(|| format!("session row has malformed user_id {:?}", row.user_id))?;

        Ok(SessionRecord {
            token: SessionToken::new(row.token),
            user_id,
            expires_at: parse_timestamp(&row.expires_at)?,
        })
    }
}

impl From<&SessionRecord> for SessionRow {
    fn from(record: &SessionRecord) -> Self {
        Self {
            token: record.token.to_string(),
            user_id: record.user_id.to_string(),
            expires_at: record.expires_at.to_rfc3339(),
        }
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow!("malformed timestamp {:?}: {}", value, e))
}

/// Define the credential tables and their lookup indexes.
pub async fn ensure_schema(db: &Db) -> Result<()> {
    let schema_queries = [
        // API keys, provisioned by account administration
        "DEFINE TABLE IF NOT EXISTS api_key SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS api_key_hash ON TABLE api_key COLUMNS key_hash UNIQUE;",
        // Browser sessions, written by the session issuer
        "DEFINE TABLE IF NOT EXISTS session SCHEMALESS;
         DEFINE INDEX IF NOT EXISTS session_token ON TABLE session COLUMNS token UNIQUE;",
    ];

    for query in schema_queries {
        db.query(query).await?.check()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_api_key_row_conversion() {
        let id = Uuid::new_v4();
        let row = ApiKeyRow {
            key_hash: "h".to_string(),
            user_id: id.to_string(),
            enabled: None,
            expires_at: Some("2030-01-01T00:00:00Z".to_string()),
        };
        let record = ApiKeyRecord::try_from(row).unwrap();
        assert_eq!(record.user_id, SubjectId::new(id));
        assert!(record.enabled);
        assert_eq!(
            record.expires_at.unwrap().to_rfc3339(),
            "2030-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_malformed_user_id_is_rejected() {
        let row = ApiKeyRow {
            key_hash: "h".to_string(),
            user_id: "not-a-uuid".to_string(),
            enabled: Some(true),
            expires_at: None,
        };
        assert!(ApiKeyRecord::try_from(row).is_err());
    }

    #[test]
    fn test_session_row_conversion() {
        let id = Uuid::new_v4();
        let record = SessionRecord::try_from(SessionRow {
            token: "tok".to_string(),
            user_id: id.to_string(),
            expires_at: "2030-01-01T12:30:00+02:00".to_string(),
        })
        .unwrap();
        assert_eq!(record.token.as_str(), "tok");
        assert_eq!(record.expires_at.to_rfc3339(), "2030-01-01T10:30:00+00:00");

        let bad = SessionRow {
            token: "tok".to_string(),
            user_id: id.to_string(),
            expires_at: "yesterday".to_string(),
        };
        assert!(SessionRecord::try_from(bad).is_err());
    }
}
