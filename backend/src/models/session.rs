use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for a login session.
///
/// A row is inserted on every login and deleted on logout; one user may hold
/// several rows at once, one per device. The refresh token itself is never
/// stored, only its SHA-256 digest. A successful refresh replaces the digest
/// and expiry of the same row, so a token that has already been rotated no
/// longer matches anything.
#[derive(Debug, Clone, FromRow)]
pub struct SessionRow {
    pub id: i64,
    pub user_id: i64,
    pub refresh_token: Vec<u8>,
    /// Always UTC. The session can be refreshed strictly before this instant.
    pub refresh_token_expires: DateTime<Utc>,
}

impl SessionRow {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.refresh_token_expires <= now
    }
}

/// Values for a session row that has not been inserted yet.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub user_id: i64,
    pub refresh_token: Vec<u8>,
    pub refresh_token_expires: DateTime<Utc>,
}
