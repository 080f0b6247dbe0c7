use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ApiError, ApiSuccess, LoginRequest, TokenResponse};

use crate::middleware::auth::{self, AuthMiddlewareError};
use crate::middleware::cookies::{expired_refresh_cookie, read_refresh_cookie, refresh_cookie};
use crate::models::AppState;
use crate::services::session::{IssuedTokens, SessionError};
use crate::services::users::{self as user_service, UserError};

pub async fn login(
    state: web::Data<AppState>,
    req: HttpRequest,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    if let Some(limited) = enforce_rate_limit(&state, &req) {
        return Ok(limited);
    }

    let request = body.into_inner();

    if request.email.trim().is_empty() || request.password.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Email and password are required",
        )));
    }

    let user = match user_service::login_user(&state.db, request.email.trim(), &request.password).await {
        Ok(user) => user,
        Err(UserError::InvalidCredentials) => {
            return Ok(HttpResponse::Unauthorized().json(ApiError::new(
                "authentication_error",
                "Invalid email or password",
            )));
        }
        Err(UserError::NotActivated) => {
            return Ok(HttpResponse::BadRequest().json(ApiError::new(
                "account_not_activated",
                "Your account is not activated",
            )));
        }
        Err(e) => {
            log::error!("Login error: {:?}", e);
            return Ok(internal_error());
        }
    };

    match state.sessions.create(user.id, &user.employee_id).await {
        Ok(tokens) => Ok(token_response(&state, tokens)),
        Err(e) => Ok(session_error_response(&state, &e)),
    }
}

pub async fn refresh(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    if let Some(limited) = enforce_rate_limit(&state, &req) {
        return Ok(limited);
    }

    let user = match auth::authenticate(&req, &state).await {
        Ok(user) => user,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let Some(refresh_token) = read_refresh_cookie(&req, &state.config) else {
        return Ok(unauthorized());
    };

    match state
        .sessions
        .refresh(user.id, &user.employee_id, &refresh_token)
        .await
    {
        Ok(tokens) => Ok(token_response(&state, tokens)),
        Err(e) => Ok(session_error_response(&state, &e)),
    }
}

pub async fn destroy(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    let user = match auth::authenticate(&req, &state).await {
        Ok(user) => user,
        Err(e) => return Ok(auth_error_response(&e)),
    };

    let Some(refresh_token) = read_refresh_cookie(&req, &state.config) else {
        return Ok(unauthorized());
    };

    match state.sessions.destroy(user.id, &refresh_token).await {
        Ok(()) => Ok(HttpResponse::NoContent()
            .cookie(expired_refresh_cookie(&state.config))
            .finish()),
        Err(e) => Ok(session_error_response(&state, &e)),
    }
}

/// Keyed on the socket peer IP. Forwarded headers are client-controlled and
/// never used here.
fn enforce_rate_limit(state: &AppState, req: &HttpRequest) -> Option<HttpResponse> {
    let client = req
        .peer_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.session_rate_limiter.allow(&client) {
        return None;
    }

    log::warn!("Rate limit exceeded for {}", client);
    Some(HttpResponse::TooManyRequests().json(ApiError::new(
        "rate_limited",
        "Too many requests, please try again later",
    )))
}

fn token_response(state: &AppState, tokens: IssuedTokens) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(refresh_cookie(&state.config, &tokens.refresh_token))
        .json(ApiSuccess::new(TokenResponse {
            access_token: tokens.access_token,
            expires_in: state.sessions.access_token_ttl().num_seconds(),
        }))
}

/// The only distinction leaked to the client is "log in again"; every other
/// credential problem gets the same 401 body.
fn session_error_response(state: &AppState, e: &SessionError) -> HttpResponse {
    match e {
        SessionError::MustLogin => HttpResponse::Unauthorized()
            .cookie(expired_refresh_cookie(&state.config))
            .json(ApiError::new("must_login", "Your session has expired, please log in again")),
        SessionError::NotFound => HttpResponse::NotFound()
            .cookie(expired_refresh_cookie(&state.config))
            .json(ApiError::new("not_found", "Session not found")),
        e if e.is_internal() => {
            log::error!("Session error: {}", e);
            internal_error()
        }
        _ => unauthorized(),
    }
}

pub(crate) fn auth_error_response(e: &AuthMiddlewareError) -> HttpResponse {
    if e.is_internal() {
        return internal_error();
    }
    unauthorized()
}

pub(crate) fn unauthorized() -> HttpResponse {
    HttpResponse::Unauthorized().json(ApiError::new(
        "unauthorized",
        "You need to be logged-in to perform this action.",
    ))
}

pub(crate) fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(ApiError::new(
        "internal_error",
        "Something went wrong, please try again later",
    ))
}
