use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{NewSession, SessionRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Persistence boundary for session rows.
///
/// Implementations must make `update_hash_and_expiry` a single atomic
/// compare-and-swap on the current hash: of two callers presenting the same
/// current hash, at most one may see a row affected.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &NewSession) -> Result<i64, StoreError>;

    async fn find_by_owner_and_hash(
        &self,
        user_id: i64,
        hash: &[u8],
    ) -> Result<Option<SessionRow>, StoreError>;

    async fn update_hash_and_expiry(
        &self,
        id: i64,
        current_hash: &[u8],
        new_hash: &[u8],
        expires: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    async fn delete_by_owner_and_hash(&self, user_id: i64, hash: &[u8]) -> Result<u64, StoreError>;

    /// Remove every session whose refresh token expired at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError>;
}

pub struct SqliteSessionStore {
    pool: SqlitePool,
}

impl SqliteSessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn insert(&self, session: &NewSession) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sessions (user_id, refresh_token, refresh_token_expires)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(session.user_id)
        .bind(&session.refresh_token)
        .bind(session.refresh_token_expires)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn find_by_owner_and_hash(
        &self,
        user_id: i64,
        hash: &[u8],
    ) -> Result<Option<SessionRow>, StoreError> {
        let session = sqlx::query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE user_id = ? AND refresh_token = ?",
        )
        .bind(user_id)
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    async fn update_hash_and_expiry(
        &self,
        id: i64,
        current_hash: &[u8],
        new_hash: &[u8],
        expires: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE sessions SET refresh_token = ?, refresh_token_expires = ?
            WHERE id = ? AND refresh_token = ?
            "#,
        )
        .bind(new_hash)
        .bind(expires)
        .bind(id)
        .bind(current_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_by_owner_and_hash(&self, user_id: i64, hash: &[u8]) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = ? AND refresh_token = ?")
            .bind(user_id)
            .bind(hash)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM sessions WHERE refresh_token_expires <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
