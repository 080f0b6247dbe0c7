use actix_web::{web, HttpRequest, HttpResponse, Result};
use shared::{ActivateUserRequest, ApiError, ApiSuccess};

use crate::handlers::sessions::{self, auth_error_response, internal_error};
use crate::middleware::auth;
use crate::models::AppState;
use crate::services::users::{self as user_service, UserError};

const MIN_PASSWORD_LEN: usize = 8;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/sessions", web::post().to(sessions::login))
            .route("/sessions/refresh", web::post().to(sessions::refresh))
            .route("/sessions/destroy", web::post().to(sessions::destroy))
            .route("/activation", web::patch().to(activate_user))
            .route("/me", web::get().to(get_current_user))
    );
}

async fn activate_user(
    state: web::Data<AppState>,
    body: web::Json<ActivateUserRequest>,
) -> Result<HttpResponse> {
    let request = body.into_inner();

    if request.employee_id.trim().is_empty() || request.email.trim().is_empty() {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Employee id and email are required",
        )));
    }

    if request.password.len() < MIN_PASSWORD_LEN {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Password must be at least 8 characters",
        )));
    }

    if request.password != request.confirm_password {
        return Ok(HttpResponse::BadRequest().json(ApiError::new(
            "validation_error",
            "Passwords do not match",
        )));
    }

    match user_service::activate_user(
        &state.db,
        request.employee_id.trim(),
        request.email.trim(),
        &request.password,
    )
    .await
    {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user.to_shared()))),
        Err(UserError::NotFound) => Ok(HttpResponse::NotFound().json(ApiError::new(
            "not_found",
            "No account with that employee id and email",
        ))),
        Err(UserError::AlreadyActivated) => Ok(HttpResponse::BadRequest().json(ApiError::new(
            "already_activated",
            "Account already activated",
        ))),
        Err(e) => {
            log::error!("Activation error: {:?}", e);
            Ok(internal_error())
        }
    }
}

async fn get_current_user(state: web::Data<AppState>, req: HttpRequest) -> Result<HttpResponse> {
    match auth::authenticate(&req, &state).await {
        Ok(user) => Ok(HttpResponse::Ok().json(ApiSuccess::new(user.to_shared()))),
        Err(e) => Ok(auth_error_response(&e)),
    }
}
