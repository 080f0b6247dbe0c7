//! Session lifecycle: login, refresh-token rotation, logout, and access-token
//! verification.
//!
//! A session pairs a short-lived signed access token with a long-lived
//! refresh token. Only the refresh token's digest is persisted. Every refresh
//! replaces that digest, so a refresh token works exactly once.

use std::sync::Arc;

use chrono::{Duration, Utc};
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::models::NewSession;
use crate::services::session_store::{SessionStore, StoreError};
use crate::services::token::{self, TokenError, REFRESH_SECRET_LEN};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Session expired, login required")]
    MustLogin,
    #[error("Session not found")]
    NotFound,
    #[error("Token error: {0}")]
    Token(#[from] TokenError),
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Failures that are ours (entropy, signing, persistence), not the caller's.
    pub fn is_internal(&self) -> bool {
        match self {
            SessionError::Token(e) => !e.is_credential_error(),
            SessionError::Store(_) => true,
            _ => false,
        }
    }
}

/// Token lifetimes and signing key.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let (access_token_ttl, refresh_token_ttl) = config.token_ttls()?;
        Ok(Self {
            jwt_secret: config.jwt_secret.clone(),
            access_token_ttl,
            refresh_token_ttl,
        })
    }
}

/// A freshly issued credential pair. `refresh_token` is the transport-encoded
/// raw secret and must only ever be handed to the client.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// Holds no mutable state of its own; every mutation goes through the store.
pub struct SessionService {
    store: Arc<dyn SessionStore>,
    settings: SessionSettings,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>, settings: SessionSettings) -> Self {
        Self { store, settings }
    }

    pub fn access_token_ttl(&self) -> Duration {
        self.settings.access_token_ttl
    }

    /// Start a new session for `user_id` and issue its first token pair.
    ///
    /// Both tokens are minted before anything is written, so a failure never
    /// leaves a committed row without a response, nor a response without a row.
    pub async fn create(&self, user_id: i64, subject: &str) -> Result<IssuedTokens, SessionError> {
        let access_token = self.new_access_token(subject)?;
        let (secret, hash) = new_refresh_secret()?;

        let session = NewSession {
            user_id,
            refresh_token: hash,
            refresh_token_expires: Utc::now() + self.settings.refresh_token_ttl,
        };
        self.store.insert(&session).await.map_err(|e| {
            log::error!("Cannot insert session for user {}: {}", user_id, e);
            SessionError::from(e)
        })?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: token::encode_transport(&secret),
        })
    }

    /// Rotate the refresh token of an existing session and issue a new pair.
    ///
    /// The presented token is single-use: once rotated, presenting it again
    /// fails with `Unauthorized`. Reuse of a rotated token is only reported,
    /// the session that rotated it stays valid.
    pub async fn refresh(
        &self,
        user_id: i64,
        subject: &str,
        presented: &str,
    ) -> Result<IssuedTokens, SessionError> {
        let raw = token::decode_transport(presented).map_err(|_| {
            log::debug!("Malformed refresh token presented for user {}", user_id);
            SessionError::Unauthorized
        })?;
        let current_hash = token::hash(&raw);

        let session = self
            .store
            .find_by_owner_and_hash(user_id, &current_hash)
            .await
            .map_err(|e| {
                log::error!("Cannot look up session for user {}: {}", user_id, e);
                SessionError::from(e)
            })?
            .filter(|session| session.user_id == user_id)
            .ok_or_else(|| {
                log::warn!(
                    "Refresh token for user {} matches no session (never issued or already rotated)",
                    user_id
                );
                SessionError::Unauthorized
            })?;

        let now = Utc::now();
        if session.is_expired_at(now) {
            log::debug!("Session {} expired at {}", session.id, session.refresh_token_expires);
            return Err(SessionError::MustLogin);
        }

        // Mint everything before the row changes: after a successful rotation
        // nothing may fail, or the client would be left holding a dead token.
        let access_token = self.new_access_token(subject)?;
        let (secret, new_hash) = new_refresh_secret()?;

        let rows = self
            .store
            .update_hash_and_expiry(
                session.id,
                &session.refresh_token,
                &new_hash,
                now + self.settings.refresh_token_ttl,
            )
            .await
            .map_err(|e| {
                log::error!("Cannot rotate session {}: {}", session.id, e);
                SessionError::from(e)
            })?;

        if rows == 0 {
            log::warn!("Session {} was rotated by a concurrent refresh", session.id);
            return Err(SessionError::Unauthorized);
        }

        Ok(IssuedTokens {
            access_token,
            refresh_token: token::encode_transport(&secret),
        })
    }

    /// End the session identified by `user_id` and the presented refresh token.
    pub async fn destroy(&self, user_id: i64, presented: &str) -> Result<(), SessionError> {
        let raw = token::decode_transport(presented).map_err(|_| {
            log::debug!("Malformed refresh token presented on logout for user {}", user_id);
            SessionError::Unauthorized
        })?;

        let rows = self
            .store
            .delete_by_owner_and_hash(user_id, &token::hash(&raw))
            .await
            .map_err(|e| {
                log::error!("Cannot delete session for user {}: {}", user_id, e);
                SessionError::from(e)
            })?;

        if rows == 0 {
            return Err(SessionError::NotFound);
        }

        Ok(())
    }

    /// Verify an access token and return its subject. Never touches the store.
    pub fn verify(&self, access_token: &str) -> Result<String, SessionError> {
        let claims = token::verify_access_token(access_token, &self.settings.jwt_secret)?;
        Ok(claims.sub)
    }

    fn new_access_token(&self, subject: &str) -> Result<String, SessionError> {
        token::sign_access_token(subject, self.settings.access_token_ttl, &self.settings.jwt_secret)
            .map_err(|e| {
                log::error!("Cannot create access token: {}", e);
                SessionError::from(e)
            })
    }
}

fn new_refresh_secret() -> Result<(Vec<u8>, Vec<u8>), SessionError> {
    let secret = token::generate_secret(REFRESH_SECRET_LEN).map_err(|e| {
        log::error!("Cannot create refresh token: {}", e);
        SessionError::from(e)
    })?;
    let hash = token::hash(&secret);
    Ok((secret, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::DateTime;
    use sqlx::SqlitePool;

    use crate::models::SessionRow;
    use crate::services::session_store::SqliteSessionStore;
    use crate::test_support::{insert_user, setup_test_db};

    fn settings() -> SessionSettings {
        SessionSettings {
            jwt_secret: "test-secret".to_string(),
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(7),
        }
    }

    async fn setup() -> (SqlitePool, SessionService, i64) {
        let pool = setup_test_db().await;
        let user_id = insert_user(&pool, "E001", "e001@example.com", None).await;
        let service = SessionService::new(Arc::new(SqliteSessionStore::new(pool.clone())), settings());
        (pool, service, user_id)
    }

    async fn stored_hashes(pool: &SqlitePool, user_id: i64) -> Vec<Vec<u8>> {
        sqlx::query_scalar("SELECT refresh_token FROM sessions WHERE user_id = ?")
            .bind(user_id)
            .fetch_all(pool)
            .await
            .unwrap()
    }

    fn hash_of(refresh_token: &str) -> Vec<u8> {
        token::hash(&token::decode_transport(refresh_token).unwrap())
    }

    #[tokio::test]
    async fn test_create_stores_only_the_hash() {
        let (pool, service, user_id) = setup().await;

        let tokens = service.create(user_id, "E001").await.unwrap();

        let hashes = stored_hashes(&pool, user_id).await;
        assert_eq!(hashes.len(), 1);
        assert_eq!(hashes[0], hash_of(&tokens.refresh_token));

        let raw = token::decode_transport(&tokens.refresh_token).unwrap();
        assert_eq!(raw.len(), REFRESH_SECRET_LEN);
        assert_ne!(hashes[0], raw);
        assert_eq!(service.verify(&tokens.access_token).unwrap(), "E001");
    }

    #[tokio::test]
    async fn test_create_sets_refresh_expiry_from_ttl() {
        let (pool, service, user_id) = setup().await;
        let before = Utc::now();

        service.create(user_id, "E001").await.unwrap();

        let expires: DateTime<Utc> =
            sqlx::query_scalar("SELECT refresh_token_expires FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(expires >= before + Duration::days(7) - Duration::seconds(1));
        assert!(expires <= Utc::now() + Duration::days(7) + Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_one_user_may_hold_several_sessions() {
        let (pool, service, user_id) = setup().await;

        let laptop = service.create(user_id, "E001").await.unwrap();
        let phone = service.create(user_id, "E001").await.unwrap();

        assert_ne!(laptop.refresh_token, phone.refresh_token);
        assert_eq!(stored_hashes(&pool, user_id).await.len(), 2);
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_old_token_is_rejected() {
        let (pool, service, user_id) = setup().await;
        let first = service.create(user_id, "E001").await.unwrap();

        let second = service.refresh(user_id, "E001", &first.refresh_token).await.unwrap();

        assert_ne!(second.refresh_token, first.refresh_token);
        assert_eq!(stored_hashes(&pool, user_id).await, vec![hash_of(&second.refresh_token)]);
        assert_eq!(service.verify(&second.access_token).unwrap(), "E001");

        let replay = service.refresh(user_id, "E001", &first.refresh_token).await;
        assert!(matches!(replay, Err(SessionError::Unauthorized)));

        // Replay detection does not revoke the live session.
        assert!(service.refresh(user_id, "E001", &second.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn test_refresh_extends_expiry_by_full_ttl() {
        let (pool, service, user_id) = setup().await;
        let first = service.create(user_id, "E001").await.unwrap();

        sqlx::query("UPDATE sessions SET refresh_token_expires = ? WHERE user_id = ?")
            .bind(Utc::now() + Duration::seconds(60))
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        service.refresh(user_id, "E001", &first.refresh_token).await.unwrap();

        let expires: DateTime<Utc> =
            sqlx::query_scalar("SELECT refresh_token_expires FROM sessions WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        let expected = Utc::now() + Duration::days(7);
        assert!((expected - expires).num_milliseconds().abs() <= 1000);
    }

    #[tokio::test]
    async fn test_refresh_expired_session_requires_login() {
        let (pool, service, user_id) = setup().await;
        let tokens = service.create(user_id, "E001").await.unwrap();

        sqlx::query("UPDATE sessions SET refresh_token_expires = ? WHERE user_id = ?")
            .bind(Utc::now() - Duration::seconds(1))
            .bind(user_id)
            .execute(&pool)
            .await
            .unwrap();

        let result = service.refresh(user_id, "E001", &tokens.refresh_token).await;
        assert!(matches!(result, Err(SessionError::MustLogin)));

        // The row is left for the lazy path to keep rejecting.
        let again = service.refresh(user_id, "E001", &tokens.refresh_token).await;
        assert!(matches!(again, Err(SessionError::MustLogin)));
    }

    #[tokio::test]
    async fn test_refresh_rejects_malformed_and_unknown_tokens() {
        let (_pool, service, user_id) = setup().await;
        service.create(user_id, "E001").await.unwrap();

        let malformed = service.refresh(user_id, "E001", "%%%not-a-token").await;
        assert!(matches!(malformed, Err(SessionError::Unauthorized)));

        let unknown = token::encode_transport(&[7u8; 32]);
        let result = service.refresh(user_id, "E001", &unknown).await;
        assert!(matches!(result, Err(SessionError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_refresh_token_is_bound_to_its_owner() {
        let (pool, service, alice) = setup().await;
        let bob = insert_user(&pool, "E002", "e002@example.com", None).await;
        let tokens = service.create(alice, "E001").await.unwrap();

        let result = service.refresh(bob, "E002", &tokens.refresh_token).await;
        assert!(matches!(result, Err(SessionError::Unauthorized)));

        let result = service.destroy(bob, &tokens.refresh_token).await;
        assert!(matches!(result, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_has_single_winner() {
        let (_pool, service, user_id) = setup().await;
        let tokens = service.create(user_id, "E001").await.unwrap();

        let (a, b) = tokio::join!(
            service.refresh(user_id, "E001", &tokens.refresh_token),
            service.refresh(user_id, "E001", &tokens.refresh_token),
        );

        let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(successes, 1);
        assert!(matches!(a.err().or(b.err()), Some(SessionError::Unauthorized)));
    }

    #[tokio::test]
    async fn test_destroy_then_destroy_again_is_not_found() {
        let (pool, service, user_id) = setup().await;
        let tokens = service.create(user_id, "E001").await.unwrap();

        service.destroy(user_id, &tokens.refresh_token).await.unwrap();
        assert!(stored_hashes(&pool, user_id).await.is_empty());

        let again = service.destroy(user_id, &tokens.refresh_token).await;
        assert!(matches!(again, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn test_destroy_rejects_malformed_token() {
        let (_pool, service, user_id) = setup().await;

        let result = service.destroy(user_id, "***").await;
        assert!(matches!(result, Err(SessionError::Unauthorized)));
    }

    /// Counts calls and fails on demand, for tests that must observe the
    /// store boundary.
    #[derive(Default)]
    struct ProbeStore {
        calls: AtomicUsize,
        fail_updates: bool,
        row: Option<SessionRow>,
    }

    impl ProbeStore {
        fn touch(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionStore for ProbeStore {
        async fn insert(&self, _session: &NewSession) -> Result<i64, StoreError> {
            self.touch();
            Err(StoreError::DatabaseError(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_owner_and_hash(
            &self,
            _user_id: i64,
            _hash: &[u8],
        ) -> Result<Option<SessionRow>, StoreError> {
            self.touch();
            Ok(self.row.clone())
        }

        async fn update_hash_and_expiry(
            &self,
            _id: i64,
            _current_hash: &[u8],
            _new_hash: &[u8],
            _expires: DateTime<Utc>,
        ) -> Result<u64, StoreError> {
            self.touch();
            if self.fail_updates {
                return Err(StoreError::DatabaseError(sqlx::Error::PoolTimedOut));
            }
            Ok(1)
        }

        async fn delete_by_owner_and_hash(&self, _user_id: i64, _hash: &[u8]) -> Result<u64, StoreError> {
            self.touch();
            Ok(0)
        }

        async fn delete_expired(&self, _now: DateTime<Utc>) -> Result<u64, StoreError> {
            self.touch();
            Ok(0)
        }
    }

    #[tokio::test]
    async fn test_verify_never_touches_the_store() {
        let store = Arc::new(ProbeStore::default());
        let service = SessionService::new(store.clone(), settings());

        let access = token::sign_access_token("E001", Duration::minutes(30), "test-secret").unwrap();
        assert_eq!(service.verify(&access).unwrap(), "E001");

        let forged = token::sign_access_token("E001", Duration::minutes(30), "other-secret").unwrap();
        assert!(matches!(
            service.verify(&forged),
            Err(SessionError::Token(TokenError::Invalid))
        ));

        let expired = token::sign_access_token("E001", Duration::zero(), "test-secret").unwrap();
        assert!(matches!(
            service.verify(&expired),
            Err(SessionError::Token(TokenError::Expired))
        ));

        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_create_persistence_failure_is_internal() {
        let service = SessionService::new(Arc::new(ProbeStore::default()), settings());

        let err = service.create(42, "E001").await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(err.is_internal());
    }

    #[tokio::test]
    async fn test_refresh_rotation_failure_returns_no_tokens() {
        let presented = token::encode_transport(&[1u8; 32]);
        let store = Arc::new(ProbeStore {
            fail_updates: true,
            row: Some(SessionRow {
                id: 1,
                user_id: 42,
                refresh_token: hash_of(&presented),
                refresh_token_expires: Utc::now() + Duration::days(1),
            }),
            ..Default::default()
        });
        let service = SessionService::new(store, settings());

        let err = service.refresh(42, "E001", &presented).await.unwrap_err();
        assert!(matches!(err, SessionError::Store(_)));
        assert!(err.is_internal());
    }

    #[test]
    fn test_error_classification() {
        assert!(!SessionError::Unauthorized.is_internal());
        assert!(!SessionError::MustLogin.is_internal());
        assert!(!SessionError::NotFound.is_internal());
        assert!(!SessionError::Token(TokenError::Expired).is_internal());
        assert!(SessionError::Token(TokenError::Signing("bad key".to_string())).is_internal());
    }

    #[test]
    fn test_settings_from_config() {
        let settings = SessionSettings::from_config(&crate::config::test_config()).unwrap();

        assert_eq!(settings.access_token_ttl, Duration::minutes(30));
        assert_eq!(settings.refresh_token_ttl, Duration::days(7));
        assert!(settings.refresh_token_ttl > settings.access_token_ttl * 100);

        let broken = Config {
            refresh_token_ttl_secs: -1,
            ..crate::config::test_config()
        };
        assert!(SessionSettings::from_config(&broken).is_err());
    }
}
