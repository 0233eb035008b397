#![allow(dead_code)]

use actix_http::Request;
use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::http::StatusCode;
use actix_web::middleware::{Condition, Logger};
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use gardengate::auth::{AuthService, CsrfGuard, RateLimiter, TokenService};
use gardengate::routes;
use gardengate::routes::health;
use gardengate::state::AppState;
use gardengate::store::MemoryCredentialStore;

pub const SECRET: &str = "integration-test-secret";
pub const INVITE_CODE: &str = "GARDEN01";
pub const PASSWORD: &str = "Jardim#2024";
pub const ADMIN_EMAIL: &str = "admin@garden.pt";

pub fn state_with_limit(max_requests: u32) -> web::Data<AppState> {
    let tokens = TokenService::new(SECRET, chrono::Duration::hours(1)).unwrap();
    let service = AuthService::new(Arc::new(MemoryCredentialStore::new()), tokens)
        .with_admin_invite_code(Some(INVITE_CODE.to_string()))
        .with_bcrypt_cost(4);
    web::Data::new(AppState::new(
        service,
        RateLimiter::new(max_requests, Duration::from_secs(60)),
    ))
}

pub fn state() -> web::Data<AppState> {
    state_with_limit(100)
}

pub async fn init_app(
    state: web::Data<AppState>,
    csrf: bool,
) -> impl Service<Request, Response = ServiceResponse<impl MessageBody>, Error = actix_web::Error> {
    test::init_service(
        App::new()
            .app_data(state)
            .wrap(Condition::new(csrf, CsrfGuard))
            .wrap(Logger::default())
            .service(health::health)
            .service(web::scope("/api").configure(routes::config))
            .default_service(web::to(routes::not_found)),
    )
    .await
}

/// Sends the request and returns the status with the parsed JSON body.
pub async fn call<S, B>(app: &S, req: Request) -> (StatusCode, Value)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let resp = test::call_service(app, req).await;
    let status = resp.status();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

pub fn post(uri: &str, token: Option<&str>, body: Value) -> Request {
    let mut req = test::TestRequest::post().uri(uri).set_json(body);
    if let Some(token) = token {
        req = req.insert_header(bearer(token));
    }
    req.to_request()
}

pub fn get(uri: &str, token: &str) -> Request {
    test::TestRequest::get()
        .uri(uri)
        .insert_header(bearer(token))
        .to_request()
}

pub fn registration(name: &str, email: &str, role: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "password": PASSWORD,
        "role": role
    })
}

/// Creates the admin account through the service and returns its token.
pub async fn admin_token<S, B>(app: &S, state: &web::Data<AppState>) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    state
        .service
        .bootstrap_admin("Site Admin", ADMIN_EMAIL, PASSWORD)
        .await
        .unwrap();
    login(app, ADMIN_EMAIL).await
}

pub async fn login<S, B>(app: &S, email: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = call(
        app,
        post(
            "/api/auth/login",
            None,
            json!({ "email": email, "password": PASSWORD }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["data"]["token"].as_str().unwrap().to_string()
}

/// Registers an account and returns its id.
pub async fn register<S, B>(app: &S, name: &str, email: &str, role: &str) -> String
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let (status, body) = call(
        app,
        post("/api/auth/register", None, registration(name, email, role)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    body["data"]["user"]["id"].as_str().unwrap().to_string()
}

/// Registers, approves and logs in an account. Returns `(id, token)`.
pub async fn approved_user<S, B>(
    app: &S,
    admin_token: &str,
    name: &str,
    email: &str,
    role: &str,
) -> (String, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let id = register(app, name, email, role).await;
    let (status, body) = call(
        app,
        post(
            &format!("/api/users/{}/approve", id),
            Some(admin_token),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "approval failed: {}", body);
    let token = login(app, email).await;
    (id, token)
}
