//! Refresh-token cookie handling.
//!
//! The cookie is HTTP-only and scoped to the session routes, so the browser
//! only sends it to refresh and logout.

use actix_web::cookie::{time::Duration as CookieDuration, Cookie, SameSite};
use actix_web::HttpRequest;

use crate::config::Config;

pub fn refresh_cookie(config: &Config, value: &str) -> Cookie<'static> {
    build_cookie(config, value.to_string(), config.refresh_token_ttl_secs)
}

/// Same cookie with an empty value and zero max-age; tells the browser to
/// drop it immediately.
pub fn expired_refresh_cookie(config: &Config) -> Cookie<'static> {
    build_cookie(config, String::new(), 0)
}

pub fn read_refresh_cookie(req: &HttpRequest, config: &Config) -> Option<String> {
    req.cookie(&config.refresh_cookie_name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

fn build_cookie(config: &Config, value: String, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(config.refresh_cookie_name.clone(), value)
        .path(config.refresh_cookie_path.clone())
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(max_age_secs))
        .finish()
}
