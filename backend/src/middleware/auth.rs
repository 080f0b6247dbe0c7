use actix_web::{http::header, HttpRequest};

use crate::models::{AppState, UserRow};
use crate::services::session::{SessionError, SessionService};
use crate::services::token::TokenError;
use crate::services::users as user_service;

/// Extract the raw token from an `Authorization: Bearer <token>` header
pub fn extract_bearer_token(req: &HttpRequest) -> Result<&str, AuthMiddlewareError> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthMiddlewareError::MissingToken)?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthMiddlewareError::InvalidToken)?;

    auth_str
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthMiddlewareError::InvalidToken)
}

/// Extract the employee id (token subject) from the Authorization header.
/// Signature and expiry only; no database access.
pub fn extract_employee_id(req: &HttpRequest, sessions: &SessionService) -> Result<String, AuthMiddlewareError> {
    let token = extract_bearer_token(req)?;

    sessions.verify(token).map_err(|e| {
        log::debug!("Rejected access token: {}", e);
        match e {
            SessionError::Token(TokenError::Expired) => AuthMiddlewareError::ExpiredToken,
            _ => AuthMiddlewareError::InvalidToken,
        }
    })
}

/// Resolve the bearer token to the user it was issued for.
pub async fn authenticate(req: &HttpRequest, state: &AppState) -> Result<UserRow, AuthMiddlewareError> {
    let employee_id = extract_employee_id(req, &state.sessions)?;

    match user_service::get_user_by_employee_id(&state.db, &employee_id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => {
            log::debug!("Access token subject {} has no user", employee_id);
            Err(AuthMiddlewareError::UnknownUser)
        }
        Err(e) => {
            log::error!("Error fetching user for access token: {:?}", e);
            Err(AuthMiddlewareError::Internal)
        }
    }
}

#[derive(Debug)]
pub enum AuthMiddlewareError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    UnknownUser,
    Internal,
}

impl AuthMiddlewareError {
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthMiddlewareError::Internal)
    }
}

impl std::fmt::Display for AuthMiddlewareError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMiddlewareError::MissingToken => write!(f, "Missing authorization token"),
            AuthMiddlewareError::InvalidToken => write!(f, "Invalid authorization token"),
            AuthMiddlewareError::ExpiredToken => write!(f, "Expired authorization token"),
            AuthMiddlewareError::UnknownUser => write!(f, "Unknown token subject"),
            AuthMiddlewareError::Internal => write!(f, "Failed to resolve token subject"),
        }
    }
}

impl std::error::Error for AuthMiddlewareError {}
