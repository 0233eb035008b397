use actix_web::cookie::{Cookie, SameSite};
use actix_web::{get, post, web, HttpResponse, Responder};
use serde_json::json;

use crate::{
    auth::{AuthResponse, AuthenticatedUser, Authorize, LoginRequest, RegisterRequest},
    error::AppError,
    security::csrf::{generate_token, CSRF_COOKIE},
    state::AppState,
};

/// Register a new account
///
/// Clients and collaborators wait for approval; admins (with a valid invite code)
/// are approved and signed in straight away.
#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    register_data: web::Json<RegisterRequest>,
) -> Result<impl Responder, AppError> {
    let registration = state.service.register(register_data.into_inner()).await?;

    let mut data = json!({ "user": registration.user.to_public() });
    let message = match registration.token {
        Some(token) => {
            data["token"] = json!(token);
            "Administrator account created"
        }
        None => "Registration received, your account is awaiting approval",
    };

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": message,
        "data": data
    })))
}

/// Login
///
/// Authenticates the account and returns a bearer token.
#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    login_data: web::Json<LoginRequest>,
) -> Result<impl Responder, AppError> {
    let (token, user) = state.service.login(login_data.into_inner()).await?;
    log::info!("account {} logged in", user.id);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "data": AuthResponse {
            token,
            expires_in: state.service.tokens().ttl().num_seconds(),
            user: user.to_public(),
        }
    })))
}

/// Current account
#[get("/me", wrap = "Authorize::authenticated()")]
pub async fn me(user: AuthenticatedUser) -> Result<impl Responder, AppError> {
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": { "user": user.to_public() }
    })))
}

/// Logout
///
/// Sessions are stateless; the client discards its token.
#[post("/logout", wrap = "Authorize::authenticated()")]
pub async fn logout(user: AuthenticatedUser) -> Result<impl Responder, AppError> {
    log::info!("account {} logged out", user.id);
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out"
    })))
}

/// Issue a CSRF token
///
/// Sets the `csrf_token` cookie and returns the same value, which the client echoes
/// in the `X-CSRF-Token` header of state-changing requests.
#[get("/csrf-token")]
pub async fn csrf_token() -> impl Responder {
    let token = generate_token();
    let cookie = Cookie::build(CSRF_COOKIE, token.clone())
        .path("/")
        .same_site(SameSite::Strict)
        .http_only(true)
        .finish();

    HttpResponse::Ok().cookie(cookie).json(json!({
        "success": true,
        "data": { "csrfToken": token }
    }))
}
