use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod handlers;
mod middleware;
mod models;
mod services;
#[cfg(test)]
mod test_support;

use config::Config;
use services::session::{SessionService, SessionSettings};
use services::session_store::{SessionStore, SqliteSessionStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    // Load configuration
    let config = Config::from_env().expect("Failed to load configuration");

    log::info!("Starting server at {}:{}", config.host, config.port);

    // Create database pool
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect(&config.database_url)
        .await
        .expect("Failed to create database pool");

    // Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    log::info!("Database migrations completed");

    let session_store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(pool.clone()));

    // Expired sessions are otherwise only discovered when presented
    if let Some(secs) = config.session_sweep_interval_secs {
        let store = session_store.clone();
        tokio::spawn(async move {
            services::session_sweep::start_sweeper(store, Duration::from_secs(secs)).await;
        });
    }

    let sessions = Arc::new(SessionService::new(
        session_store,
        SessionSettings::from_config(&config).expect("Invalid session settings"),
    ));

    // Throttles login and refresh per client IP
    let session_rate_limiter = Arc::new(middleware::RateLimiter::new(
        config.rate_limit_max_requests,
        config.rate_limit_window_secs,
    ));

    // Create app state
    let app_state = web::Data::new(models::AppState {
        db: pool,
        config: config.clone(),
        sessions,
        session_rate_limiter,
    });

    let allowed_origins = config.cors_origins.clone();

    // Start HTTP server
    HttpServer::new(move || {
        let allowed_origins = allowed_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                let origin_str = origin.to_str().unwrap_or("");
                allowed_origins.iter().any(|allowed| origin_str == allowed)
            })
            .allowed_methods(vec!["GET", "POST", "PATCH", "OPTIONS"])
            .allowed_headers(vec!["Authorization", "Content-Type"])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(Logger::default())
            .wrap(cors)
            .configure(handlers::configure_routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
