use actix_cors::Cors;
use actix_web::http::header::{self, HeaderName};
use actix_web::middleware::{Condition, Logger};
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::fmt::Display;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use gardengate::auth::{AuthService, CsrfGuard, RateLimiter, TokenService};
use gardengate::config::Config;
use gardengate::routes;
use gardengate::security::validators::PhonePattern;
use gardengate::state::AppState;
use gardengate::store::{CredentialStore, MemoryCredentialStore, PgCredentialStore};

fn startup_error(error: impl Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, error.to_string())
}

/// Picks the credential store once for the lifetime of the process.
async fn open_store(config: &Config) -> io::Result<Arc<dyn CredentialStore>> {
    match &config.database_url {
        Some(url) => match PgPool::connect(url).await {
            Ok(pool) => {
                let store = PgCredentialStore::new(pool);
                store.ensure_schema().await.map_err(startup_error)?;
                log::info!("using postgres credential store");
                return Ok(Arc::new(store));
            }
            Err(e) if config.allow_memory_store => {
                log::warn!("database unavailable ({}), falling back to memory store", e);
            }
            Err(e) => return Err(startup_error(format!("cannot connect to database: {}", e))),
        },
        None if !config.allow_memory_store => {
            return Err(startup_error(
                "DATABASE_URL must be set unless ALLOW_MEMORY_STORE is enabled",
            ));
        }
        None => {}
    }

    log::warn!("using in-memory credential store, accounts are lost on restart");
    Ok(Arc::new(MemoryCredentialStore::new()))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::from_env().map_err(startup_error)?;
    log::debug!("{:?}", config);

    if config.jwt_secret_generated {
        log::warn!("JWT_SECRET is not set, using a random secret; tokens will not survive a restart");
    }
    let tokens = TokenService::new(&config.jwt_secret, config.jwt_ttl)
        .ok_or_else(|| startup_error("JWT_SECRET must not be empty"))?;

    let mut service = AuthService::new(open_store(&config).await?, tokens)
        .with_admin_invite_code(config.admin_invite_code.clone())
        .with_bcrypt_cost(config.bcrypt_cost);
    if let Some(pattern) = &config.phone_pattern {
        service = service.with_phone_pattern(PhonePattern::new(pattern).map_err(startup_error)?);
    }

    if let Some(admin) = &config.admin {
        service
            .bootstrap_admin(&admin.name, &admin.email, &admin.password)
            .await
            .map_err(startup_error)?;
    }

    let window = Duration::from_secs(config.rate_limit_window_secs);
    let state = web::Data::new(AppState::new(
        service,
        RateLimiter::new(config.rate_limit_max_requests, window),
    ));

    let purge_state = state.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = tokio::time::interval(window);
        loop {
            ticker.tick().await;
            let purged = purge_state.limiter.purge_expired();
            if purged > 0 {
                log::debug!("purged {} expired rate limit windows", purged);
            }
        }
    });

    let csrf_enabled = config.csrf_enabled;
    let cors_origin = config.cors_allowed_origin.clone();

    log::info!("Starting gardengate server at {}", config.server_url());
    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE"])
                .allowed_headers(vec![
                    header::AUTHORIZATION,
                    header::CONTENT_TYPE,
                    HeaderName::from_static("x-csrf-token"),
                ])
                .supports_credentials()
                .max_age(3600),
            None => Cors::default(),
        };

        App::new()
            .app_data(state.clone())
            .wrap(Condition::new(csrf_enabled, CsrfGuard))
            .wrap(cors)
            .wrap(Logger::default())
            .service(routes::health::health)
            .service(web::scope("/api").configure(routes::config))
            .default_service(web::to(routes::not_found))
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
