//! Fixtures shared by the unit tests.

use std::sync::Arc;

use actix_web::web;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::models::AppState;
use crate::services::session::{SessionService, SessionSettings};
use crate::services::session_store::SqliteSessionStore;
use crate::services::users::hash_password;

/// In-memory database with migrations applied. A single connection, since
/// every `sqlite::memory:` connection is its own database.
pub async fn setup_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    sqlx::migrate!("./migrations").run(&pool).await.unwrap();

    pool
}

/// Insert a user row and return its id. With a password the account is
/// activated; without one it is pending activation.
pub async fn insert_user(pool: &SqlitePool, employee_id: &str, email: &str, password: Option<&str>) -> i64 {
    let password_hash = password.map(|p| hash_password(p).unwrap());

    sqlx::query(
        r#"
        INSERT INTO users (employee_id, name, email, password, designation, is_activated)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(employee_id)
    .bind(format!("Employee {}", employee_id))
    .bind(email)
    .bind(&password_hash)
    .bind("Engineer")
    .bind(password_hash.is_some())
    .execute(pool)
    .await
    .unwrap()
    .last_insert_rowid()
}

pub fn test_state(pool: SqlitePool, config: Config) -> web::Data<AppState> {
    let sessions = SessionService::new(
        Arc::new(SqliteSessionStore::new(pool.clone())),
        SessionSettings::from_config(&config).unwrap(),
    );
    let session_rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));

    web::Data::new(AppState {
        db: pool,
        config,
        sessions: Arc::new(sessions),
        session_rate_limiter,
    })
}
