use std::env;
use std::str::FromStr;

use chrono::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a valid {expected}, got {value:?}")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("ACCESS_TOKEN_TTL_SECS ({access}) must be shorter than REFRESH_TOKEN_TTL_SECS ({refresh})")]
    TtlOrder { access: i64, refresh: i64 },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub db_acquire_timeout_secs: u64,
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub refresh_cookie_name: String,
    /// Path prefix the refresh cookie is scoped to. Must cover the refresh
    /// and destroy routes and nothing else.
    pub refresh_cookie_path: String,
    pub cookie_secure: bool,
    pub cors_origins: Vec<String>,
    pub rate_limit_max_requests: usize,
    pub rate_limit_window_secs: u64,
    /// Interval of the expired-session sweep; `None` (or 0) leaves it disabled.
    pub session_sweep_interval_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "development-secret-key-change-in-production".to_string());
        if jwt_secret.is_empty() {
            return Err(ConfigError::Empty("JWT_SECRET"));
        }

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT", 8080, "port number")?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:adeia.db?mode=rwc".to_string()),
            db_acquire_timeout_secs: parse_var("DB_ACQUIRE_TIMEOUT_SECS", 5, "number of seconds")?,
            jwt_secret,
            access_token_ttl_secs: parse_var("ACCESS_TOKEN_TTL_SECS", 30 * 60, "number of seconds")?,
            refresh_token_ttl_secs: parse_var(
                "REFRESH_TOKEN_TTL_SECS",
                7 * 24 * 60 * 60,
                "number of seconds",
            )?,
            refresh_cookie_name: env::var("REFRESH_COOKIE_NAME").unwrap_or_else(|_| "token".to_string()),
            refresh_cookie_path: env::var("REFRESH_COOKIE_PATH")
                .unwrap_or_else(|_| "/v1/users/sessions".to_string()),
            cookie_secure: parse_var("COOKIE_SECURE", false, "boolean")?,
            cors_origins: env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            rate_limit_max_requests: parse_var("RATE_LIMIT_MAX_REQUESTS", 10, "number")?,
            rate_limit_window_secs: parse_var("RATE_LIMIT_WINDOW_SECS", 60, "number of seconds")?,
            session_sweep_interval_secs: match env::var("SESSION_SWEEP_INTERVAL_SECS") {
                Ok(value) => Some(parse_value::<u64>("SESSION_SWEEP_INTERVAL_SECS", &value, "number of seconds")?)
                    .filter(|secs| *secs > 0),
                Err(_) => None,
            },
        };
        config.token_ttls()?;

        Ok(config)
    }

    /// Access and refresh token lifetimes. Both must be positive and the
    /// access token must expire before the refresh token.
    pub fn token_ttls(&self) -> Result<(Duration, Duration), ConfigError> {
        let access = ttl_from_secs("ACCESS_TOKEN_TTL_SECS", self.access_token_ttl_secs)?;
        let refresh = ttl_from_secs("REFRESH_TOKEN_TTL_SECS", self.refresh_token_ttl_secs)?;
        if access >= refresh {
            return Err(ConfigError::TtlOrder {
                access: self.access_token_ttl_secs,
                refresh: self.refresh_token_ttl_secs,
            });
        }
        Ok((access, refresh))
    }
}

fn ttl_from_secs(key: &'static str, secs: i64) -> Result<Duration, ConfigError> {
    Duration::try_seconds(secs)
        .filter(|_| secs > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key,
            expected: "positive number of seconds",
            value: secs.to_string(),
        })
}

fn parse_var<T: FromStr>(key: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => parse_value(key, &value, expected),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str, expected: &'static str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        expected,
        value: value.to_string(),
    })
}

#[cfg(test)]
pub fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 8080,
        database_url: "sqlite::memory:".to_string(),
        db_acquire_timeout_secs: 5,
        jwt_secret: "test-secret".to_string(),
        access_token_ttl_secs: 30 * 60,
        refresh_token_ttl_secs: 7 * 24 * 60 * 60,
        refresh_cookie_name: "token".to_string(),
        refresh_cookie_path: "/v1/users/sessions".to_string(),
        cookie_secure: false,
        cors_origins: vec!["http://localhost:3000".to_string()],
        rate_limit_max_requests: 100,
        rate_limit_window_secs: 60,
        session_sweep_interval_secs: None,
    }
}
