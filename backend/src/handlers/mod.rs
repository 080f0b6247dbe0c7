use actix_web::web;

pub mod sessions;
pub mod users;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/v1")
            .configure(users::configure)
    );
}
