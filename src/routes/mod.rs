pub mod auth;
pub mod health;
pub mod users;

use actix_web::{web, HttpResponse};

use crate::error::AppError;

/// JSON bodies that fail to parse are reported through the error envelope.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(16 * 1024)
        .error_handler(|err, _req| AppError::BadRequest(format!("Invalid request body: {}", err)).into())
}

/// Malformed path ids are treated as unknown resources.
pub fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|_err, _req| AppError::NotFound("Resource not found".into()).into())
}

/// Fallback for unmatched routes.
pub async fn not_found() -> Result<HttpResponse, AppError> {
    Err(AppError::NotFound("Route not found".into()))
}

/// Mounts the API under the caller's scope, usually `/api`.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .app_data(path_config())
        .service(
            web::scope("/auth")
                .service(auth::register)
                .service(auth::login)
                .service(auth::me)
                .service(auth::logout)
                .service(auth::csrf_token),
        )
        .service(
            // `/pending` is registered before `/{id}` so it is matched first
            web::scope("/users")
                .service(users::list_pending)
                .service(users::get_user)
                .service(users::update_user)
                .service(users::approve)
                .service(users::reject)
                .service(users::activate)
                .service(users::deactivate)
                .service(users::promote)
                .service(users::set_permissions),
        );
}
