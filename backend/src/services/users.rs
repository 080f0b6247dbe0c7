use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand_core::OsRng;
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::UserRow;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Account is not activated")]
    NotActivated,
    #[error("Account already activated")]
    AlreadyActivated,
    #[error("User not found")]
    NotFound,
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
    #[error("Password hashing error")]
    HashingError,
}

pub fn hash_password(password: &str) -> Result<String, UserError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| UserError::HashingError)
}

/// Check an email/password pair. Unknown email, wrong password and an
/// account without a password are indistinguishable to the caller; the
/// activation state is only revealed once the password has matched.
pub async fn login_user(pool: &SqlitePool, email: &str, password: &str) -> Result<UserRow, UserError> {
    let user: UserRow = sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::InvalidCredentials)?;

    let password_hash = user.password.as_ref().ok_or(UserError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| UserError::InvalidCredentials)?;

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| UserError::InvalidCredentials)?;

    if !user.is_activated {
        return Err(UserError::NotActivated);
    }

    Ok(user)
}

pub async fn get_user_by_employee_id(pool: &SqlitePool, employee_id: &str) -> Result<Option<UserRow>, UserError> {
    let user: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE employee_id = ?")
        .bind(employee_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Set the first password of a pre-provisioned account and mark it active.
pub async fn activate_user(
    pool: &SqlitePool,
    employee_id: &str,
    email: &str,
    password: &str,
) -> Result<UserRow, UserError> {
    let mut user: UserRow = sqlx::query_as("SELECT * FROM users WHERE employee_id = ? AND email = ?")
        .bind(employee_id)
        .bind(email)
        .fetch_optional(pool)
        .await?
        .ok_or(UserError::NotFound)?;

    if user.is_activated {
        return Err(UserError::AlreadyActivated);
    }

    let password_hash = hash_password(password)?;

    sqlx::query("UPDATE users SET password = ?, is_activated = 1 WHERE id = ?")
        .bind(&password_hash)
        .bind(user.id)
        .execute(pool)
        .await?;

    user.password = Some(password_hash);
    user.is_activated = true;
    Ok(user)
}
