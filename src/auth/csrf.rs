//! Double-submit CSRF check for state-changing requests.

use actix_web::{
    body::EitherBody,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;

use crate::error::{AppError, ErrorCode};
use crate::security::csrf::{is_mutating, tokens_match, CSRF_COOKIE, CSRF_HEADER};

/// Requires the `X-CSRF-Token` header to equal the `csrf_token` cookie on
/// POST, PUT, PATCH and DELETE. Safe methods pass through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsrfGuard;

impl<S, B> Transform<S, ServiceRequest> for CsrfGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = CsrfGuardMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(CsrfGuardMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct CsrfGuardMiddleware<S> {
    service: Rc<S>,
}

fn check(req: &ServiceRequest) -> Result<(), AppError> {
    if !is_mutating(req.method().as_str()) {
        return Ok(());
    }

    let header = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| {
            AppError::Forbidden(ErrorCode::CsrfTokenMissing, "CSRF token missing".into())
        })?;

    let cookie = req.cookie(CSRF_COOKIE);
    let matches = cookie
        .as_ref()
        .map_or(false, |cookie| tokens_match(cookie.value(), header));
    if matches {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            ErrorCode::CsrfTokenMismatch,
            "CSRF token mismatch".into(),
        ))
    }
}

impl<S, B> Service<ServiceRequest> for CsrfGuardMiddleware<S>
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
        if let Err(err) = check(&req) {
            log::warn!("csrf check failed for {} {}: {}", req.method(), req.path(), err.code());
            return Box::pin(async move { Ok(req.error_response(err).map_into_right_body()) });
        }

        let service = Rc::clone(&self.service);
        Box::pin(async move {
            let res = service.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
