//! The authorization chain applied to protected routes.
//!
//! Steps run in a fixed order and stop at the first failure:
//! bearer token, token verification, account lookup, active flag, approval status
//! (skipped for admins), the route's role/permission/ownership policy, and finally
//! the per-user rate limit. Failures are rendered as the usual error envelope by the
//! middleware itself, so the wrapped handler never runs.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
    web, Error, HttpMessage,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use super::extractors::AuthenticatedUser;
use super::rate_limit::RateLimitInfo;
use crate::error::{AppError, ErrorCode};
use crate::models::{Role, User};
use crate::state::AppState;

/// Per-route requirements checked after the account is resolved.
///
/// Admins satisfy every role, permission and ownership requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Policy {
    roles: Vec<Role>,
    permissions: Vec<String>,
    owner_param: Option<&'static str>,
}

impl Policy {
    pub fn check(&self, user: &User, owner_id: Option<&str>) -> Result<(), AppError> {
        if user.is_admin() {
            return Ok(());
        }

        if !self.roles.is_empty() && !self.roles.contains(&user.role) {
            return Err(AppError::Forbidden(
                ErrorCode::InsufficientPermissions,
                "Your role does not allow this action".into(),
            ));
        }

        if let Some(missing) = self.permissions.iter().find(|p| !user.has_permission(p)) {
            return Err(AppError::Forbidden(
                ErrorCode::InsufficientPermissions,
                format!("Missing permission: {}", missing),
            ));
        }

        if self.owner_param.is_some() {
            let owns = owner_id
                .and_then(|id| Uuid::parse_str(id).ok())
                .map_or(false, |id| id == user.id);
            if !owns {
                return Err(AppError::Forbidden(
                    ErrorCode::AccessDenied,
                    "You can only access your own resources".into(),
                ));
            }
        }

        Ok(())
    }
}

/// Route middleware, e.g. `#[get("/pending", wrap = "Authorize::admin()")]`.
#[derive(Debug, Clone, Default)]
pub struct Authorize {
    policy: Policy,
}

impl Authorize {
    /// Any active, approved account.
    pub fn authenticated() -> Self {
        Self::default()
    }

    /// Accounts holding one of `roles`.
    pub fn roles(roles: &[Role]) -> Self {
        Self {
            policy: Policy {
                roles: roles.to_vec(),
                ..Policy::default()
            },
        }
    }

    pub fn admin() -> Self {
        Self::roles(&[Role::Admin])
    }

    /// Adds a required permission. Several calls require all of them.
    pub fn require_permission(mut self, permission: &str) -> Self {
        self.policy.permissions.push(permission.to_string());
        self
    }

    /// The path parameter `param` must hold the caller's own id.
    pub fn owner_of(mut self, param: &'static str) -> Self {
        self.policy.owner_param = Some(param);
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authorize
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = AuthorizeMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AuthorizeMiddleware {
            service: Rc::new(service),
            policy: Rc::new(self.policy.clone()),
        }))
    }
}

pub struct AuthorizeMiddleware<S> {
    service: Rc<S>,
    policy: Rc<Policy>,
}

/// The token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized(ErrorCode::NoToken, "No token provided".into()))
}

async fn authorize(req: &ServiceRequest, policy: &Policy) -> Result<(User, RateLimitInfo), AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::InternalServerError("AppState is not registered".into()))?;

    let token = bearer_token(req.headers())?;
    let user = state.service.resolve_session(token).await?;

    let owner_id = policy.owner_param.and_then(|param| req.match_info().get(param));
    policy.check(&user, owner_id)?;

    let info = state.limiter.check(user.id).map_err(AppError::RateLimited)?;
    Ok((user, info))
}

impl<S, B> Service<ServiceRequest> for AuthorizeMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let policy = Rc::clone(&self.policy);

        Box::pin(async move {
            match authorize(&req, &policy).await {
                Ok((user, info)) => {
                    req.extensions_mut().insert(AuthenticatedUser(user));
                    let mut res = service.call(req).await?;
                    let headers = res.headers_mut();
                    headers.insert(
                        HeaderName::from_static("x-ratelimit-limit"),
                        HeaderValue::from(info.limit),
                    );
                    headers.insert(
                        HeaderName::from_static("x-ratelimit-remaining"),
                        HeaderValue::from(info.remaining),
                    );
                    Ok(res.map_into_left_body())
                }
                Err(err) => {
                    log::warn!(
                        "denied {} {}: {}",
                        req.method(),
                        req.path(),
                        err.code()
                    );
                    Ok(req.error_response(err).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApprovalStatus, NewUser};

    fn user(role: Role, permissions: &[&str]) -> User {
        let mut user = NewUser {
            name: "Someone".into(),
            email: "someone@garden.pt".into(),
            password_hash: "hash".into(),
            role,
            approval_status: ApprovalStatus::Approved,
            is_active: true,
            email_verified: true,
            phone: None,
        }
        .into_user();
        user.permissions = permissions.iter().map(|p| p.to_string()).collect();
        user
    }

    #[test]
    fn test_role_policy() {
        let policy = Authorize::roles(&[Role::Collaborator]).policy().clone();

        assert!(policy.check(&user(Role::Collaborator, &[]), None).is_ok());
        assert!(policy.check(&user(Role::Admin, &[]), None).is_ok());
        assert_eq!(
            policy
                .check(&user(Role::Client, &[]), None)
                .unwrap_err()
                .code(),
            ErrorCode::InsufficientPermissions
        );
    }

    #[test]
    fn test_permissions_are_all_required() {
        let policy = Authorize::authenticated()
            .require_permission("projects:read")
            .require_permission("projects:write")
            .policy()
            .clone();

        assert!(policy
            .check(&user(Role::Client, &["projects:read", "projects:write"]), None)
            .is_ok());
        assert!(policy
            .check(&user(Role::Client, &["projects:read"]), None)
            .is_err());
        assert!(policy.check(&user(Role::Admin, &[]), None).is_ok());
    }

    #[test]
    fn test_ownership_policy() {
        let policy = Authorize::authenticated().owner_of("id").policy().clone();
        let owner = user(Role::Client, &[]);
        let own_id = owner.id.to_string();
        let other_id = Uuid::new_v4().to_string();

        assert!(policy.check(&owner, Some(&own_id)).is_ok());
        for id in [Some(other_id.as_str()), Some("not-a-uuid"), None] {
            assert_eq!(
                policy.check(&owner, id).unwrap_err().code(),
                ErrorCode::AccessDenied
            );
        }
        assert!(policy.check(&user(Role::Admin, &[]), Some(&other_id)).is_ok());
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(
            bearer_token(&headers).unwrap_err().code(),
            ErrorCode::NoToken
        );

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc.def");
    }
}
