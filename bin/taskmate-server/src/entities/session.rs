use chrono::{DateTime, Utc};
use std::future::Future;
use tracing::warn;

use crate::entities::SqliteStore;

/// A row in the `sessions` table. Written by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub trait SessionStore: Send + Sync + 'static {
    /// The user behind `token`, if the session exists and has not expired.
    fn session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Option<String>, sqlx::Error>> + Send;

    fn insert_session(
        &self,
        session: SessionRecord,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// Drop every session of `user_id`. Returns the number removed.
    fn delete_user_sessions(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

impl SessionStore for SqliteStore {
    async fn session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, sqlx::Error> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE token = ?1")
                .bind(token)
                .fetch_optional(self.pool())
                .await?;
        // Compare parsed instants; the provider may write any RFC 3339 offset.
        // An unreadable expiry denies the session.
        Ok(row.and_then(|(user_id, expires_at)| {
            match DateTime::parse_from_rfc3339(&expires_at) {
                Ok(expires_at) => (expires_at.with_timezone(&Utc) > now).then_some(user_id),
                Err(e) => {
                    warn!(user_id = %user_id, raw = %expires_at, error = %e, "unreadable session expiry; denying");
                    None
                }
            }
        }))
    }

    async fn insert_session(&self, session: SessionRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&session.token)
        .bind(&session.user_id)
        .bind(session.expires_at.to_rfc3339())
        .bind(session.created_at.to_rfc3339())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ?1")
            .bind(user_id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected())
    }
}
