//! Token primitives: secure random secrets, SHA-256 digests, the URL-safe
//! encoding used for the refresh-token cookie, and HS256 access tokens.
//!
//! Everything here is stateless. The session service composes these into
//! the login / refresh / logout lifecycle.

use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Size of a refresh-token secret before encoding.
pub const REFRESH_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Entropy source unavailable: {0}")]
    Entropy(#[from] rand::Error),
    #[error("Malformed token")]
    Malformed,
    #[error("Signing error: {0}")]
    Signing(String),
    #[error("Invalid token")]
    Invalid,
    #[error("Expired token")]
    Expired,
}

impl TokenError {
    /// True when the failure is the caller's credential rather than ours.
    pub fn is_credential_error(&self) -> bool {
        matches!(self, TokenError::Malformed | TokenError::Invalid | TokenError::Expired)
    }
}

/// Claims carried by every access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Employee id of the token holder.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Fill `n` bytes from the operating system's CSPRNG.
///
/// There is no fallback source: if the OS generator fails, so does the call.
pub fn generate_secret(n: usize) -> Result<Vec<u8>, TokenError> {
    let mut bytes = vec![0u8; n];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(bytes)
}

pub fn hash(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

pub fn encode_transport(bytes: &[u8]) -> String {
    URL_SAFE.encode(bytes)
}

pub fn decode_transport(value: &str) -> Result<Vec<u8>, TokenError> {
    URL_SAFE.decode(value).map_err(|_| TokenError::Malformed)
}

pub fn sign_access_token(subject: &str, ttl: Duration, secret: &str) -> Result<String, TokenError> {
    if secret.is_empty() {
        return Err(TokenError::Signing("signing secret is empty".to_string()));
    }

    let now = Utc::now();
    let claims = Claims {
        sub: subject.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| TokenError::Signing(e.to_string()))
}

/// Check the signature, then the expiry.
///
/// The expiry is compared against the clock here as well as inside
/// `jsonwebtoken`, with no leeway: a token is dead at its `exp` second.
pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid,
    })?;

    if Utc::now().timestamp() >= token_data.claims.exp {
        return Err(TokenError::Expired);
    }

    Ok(token_data.claims)
}
