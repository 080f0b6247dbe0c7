use std::sync::Arc;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::middleware::RateLimiter;
use crate::services::session::SessionService;

pub mod session;
pub mod user;

pub use session::*;
pub use user::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub config: Config,
    pub sessions: Arc<SessionService>,
    pub session_rate_limiter: Arc<RateLimiter>,
}
