pub mod auth;
pub mod cookies;
pub mod rate_limit;

pub use rate_limit::RateLimiter;
