use actix_web::{get, post, put, web, HttpResponse, Responder};
use serde_json::json;
use uuid::Uuid;

use crate::{
    auth::{
        AuthenticatedUser, Authorize, PermissionsRequest, PromoteRequest, RejectRequest,
        UpdateProfileRequest,
    },
    error::AppError,
    models::{PublicUser, User},
    state::AppState,
};

/// The account itself, or any admin.
fn owner_or_admin() -> Authorize {
    Authorize::authenticated().owner_of("id")
}

fn user_response(message: &str, user: &User) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": message,
        "data": { "user": user.to_public() }
    }))
}

/// List accounts awaiting approval
#[get("/pending", wrap = "Authorize::admin()")]
pub async fn list_pending(state: web::Data<AppState>) -> Result<impl Responder, AppError> {
    let users: Vec<PublicUser> = state
        .service
        .list_pending()
        .await?
        .iter()
        .map(User::to_public)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": { "users": users }
    })))
}

/// Get an account by id
#[get("/{id}", wrap = "owner_or_admin()")]
pub async fn get_user(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state.service.get_user(&actor, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": { "user": user.to_public() }
    })))
}

/// Update name, email or phone
#[put("/{id}", wrap = "owner_or_admin()")]
pub async fn update_user(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    update: web::Json<UpdateProfileRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .service
        .update_profile(&actor, path.into_inner(), update.into_inner())
        .await?;
    Ok(user_response("Profile updated", &user))
}

#[post("/{id}/approve", wrap = "Authorize::admin()")]
pub async fn approve(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state.service.approve(&actor, path.into_inner()).await?;
    Ok(user_response("Account approved", &user))
}

#[post("/{id}/reject", wrap = "Authorize::admin()")]
pub async fn reject(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<RejectRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .service
        .reject(&actor, path.into_inner(), body.into_inner().reason)
        .await?;
    Ok(user_response("Account rejected", &user))
}

#[post("/{id}/activate", wrap = "Authorize::admin()")]
pub async fn activate(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state.service.set_active(&actor, path.into_inner(), true).await?;
    Ok(user_response("Account activated", &user))
}

#[post("/{id}/deactivate", wrap = "Authorize::admin()")]
pub async fn deactivate(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
) -> Result<impl Responder, AppError> {
    let user = state.service.set_active(&actor, path.into_inner(), false).await?;
    Ok(user_response("Account deactivated", &user))
}

/// Change an account's role
#[post("/{id}/promote", wrap = "Authorize::admin()")]
pub async fn promote(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<PromoteRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .service
        .promote(&actor, path.into_inner(), body.into_inner().role)
        .await?;
    Ok(user_response("Role updated", &user))
}

/// Replace an account's permission set
#[put("/{id}/permissions", wrap = "Authorize::admin()")]
pub async fn set_permissions(
    state: web::Data<AppState>,
    actor: AuthenticatedUser,
    path: web::Path<Uuid>,
    body: web::Json<PermissionsRequest>,
) -> Result<impl Responder, AppError> {
    let user = state
        .service
        .set_permissions(&actor, path.into_inner(), body.into_inner().permissions)
        .await?;
    Ok(user_response("Permissions updated", &user))
}
