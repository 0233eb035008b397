//!
//! # Custom Error Handling
//!
//! This module defines the `AppError` type used throughout the crate and the stable
//! machine-readable `ErrorCode` strings the UI branches on.
//!
//! `AppError` implements `actix_web::error::ResponseError`, so every failure leaves the
//! server in the same envelope:
//!
//! ```json
//! { "success": false, "message": "...", "code": "PENDING_APPROVAL", ... }
//! ```
//!
//! Extra context fields (`retryAfter`, `rejectionReason`, `errors`) are merged into the
//! envelope for the variants that carry them. Internal failures never expose their
//! detail to the client; it is written to the server log instead.

use actix_web::{
    error::ResponseError,
    http::{header, StatusCode},
    HttpResponse,
};
use serde_json::{json, Map, Value};
use std::fmt;
use validator::ValidationErrors;

use crate::auth::token::TokenError;

/// Stable error codes returned in the `code` field of the error envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NoToken,
    InvalidToken,
    TokenExpired,
    UserNotFound,
    InvalidCredentials,
    AccountDisabled,
    PendingApproval,
    AccountRejected,
    InsufficientPermissions,
    AccessDenied,
    InvalidAdminCode,
    CsrfTokenMissing,
    CsrfTokenMismatch,
    RateLimitExceeded,
    ValidationError,
    BadRequest,
    NotFound,
    EmailAlreadyRegistered,
    InvalidTransition,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoToken => "NO_TOKEN",
            ErrorCode::InvalidToken => "INVALID_TOKEN",
            ErrorCode::TokenExpired => "TOKEN_EXPIRED",
            ErrorCode::UserNotFound => "USER_NOT_FOUND",
            ErrorCode::InvalidCredentials => "INVALID_CREDENTIALS",
            ErrorCode::AccountDisabled => "ACCOUNT_DISABLED",
            ErrorCode::PendingApproval => "PENDING_APPROVAL",
            ErrorCode::AccountRejected => "ACCOUNT_REJECTED",
            ErrorCode::InsufficientPermissions => "INSUFFICIENT_PERMISSIONS",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::InvalidAdminCode => "INVALID_ADMIN_CODE",
            ErrorCode::CsrfTokenMissing => "CSRF_TOKEN_MISSING",
            ErrorCode::CsrfTokenMismatch => "CSRF_TOKEN_MISMATCH",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::ValidationError => "VALIDATION_ERROR",
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::EmailAlreadyRegistered => "EMAIL_ALREADY_REGISTERED",
            ErrorCode::InvalidTransition => "INVALID_TRANSITION",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents all possible errors that can occur within the application.
///
/// Each variant maps onto one HTTP status and one or more stable error codes.
#[derive(Debug)]
pub enum AppError {
    /// Authentication failed or is missing (HTTP 401).
    Unauthorized(ErrorCode, String),
    /// The caller is authenticated but may not proceed (HTTP 403).
    Forbidden(ErrorCode, String),
    /// The account was rejected by an administrator (HTTP 403).
    /// Carries the rejection reason so it can be surfaced to the user.
    AccountRejected(Option<String>),
    /// Per-user request cap exceeded (HTTP 429). Carries the retry hint in seconds.
    RateLimited(u64),
    /// Input failed validation (HTTP 400). Every violated rule is listed.
    ValidationError(Vec<String>),
    /// Malformed request that is not a field validation failure (HTTP 400).
    BadRequest(String),
    /// Requested resource does not exist (HTTP 404).
    NotFound(String),
    /// Request conflicts with current state (HTTP 409).
    Conflict(ErrorCode, String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure from the credential store backend (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    pub fn http_status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(..) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(..) | AppError::AccountRejected(_) => StatusCode::FORBIDDEN,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::ValidationError(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Unauthorized(code, _)
            | AppError::Forbidden(code, _)
            | AppError::Conflict(code, _) => *code,
            AppError::AccountRejected(_) => ErrorCode::AccountRejected,
            AppError::RateLimited(_) => ErrorCode::RateLimitExceeded,
            AppError::ValidationError(_) => ErrorCode::ValidationError,
            AppError::BadRequest(_) => ErrorCode::BadRequest,
            AppError::NotFound(_) => ErrorCode::NotFound,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                ErrorCode::InternalError
            }
        }
    }

    /// The message that is safe to show to the client.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Unauthorized(_, msg)
            | AppError::Forbidden(_, msg)
            | AppError::Conflict(_, msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg) => msg.clone(),
            AppError::AccountRejected(_) => "Your account registration was rejected".into(),
            AppError::RateLimited(_) => "Too many requests, please try again later".into(),
            AppError::ValidationError(_) => "Validation failed".into(),
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                "An unexpected error occurred".into()
            }
        }
    }

    fn context(&self) -> Map<String, Value> {
        let mut context = Map::new();
        match self {
            AppError::AccountRejected(reason) => {
                context.insert("rejectionReason".into(), json!(reason));
            }
            AppError::RateLimited(retry_after) => {
                context.insert("retryAfter".into(), json!(retry_after));
            }
            AppError::ValidationError(errors) => {
                context.insert("errors".into(), json!(errors));
            }
            _ => {}
        }
        context
    }

    /// Builds the uniform `{success:false, message, code, ...}` body.
    pub fn envelope(&self) -> Value {
        let mut body = Map::new();
        body.insert("success".into(), Value::Bool(false));
        body.insert("message".into(), Value::String(self.public_message()));
        body.insert("code".into(), Value::String(self.code().as_str().into()));
        body.extend(self.context());
        Value::Object(body)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Unauthorized(code, msg) => write!(f, "Unauthorized ({}): {}", code, msg),
            AppError::Forbidden(code, msg) => write!(f, "Forbidden ({}): {}", code, msg),
            AppError::AccountRejected(reason) => write!(
                f,
                "Account rejected: {}",
                reason.as_deref().unwrap_or("no reason given")
            ),
            AppError::RateLimited(retry_after) => {
                write!(f, "Rate limit exceeded, retry after {}s", retry_after)
            }
            AppError::ValidationError(errors) => {
                write!(f, "Validation Error: {}", errors.join("; "))
            }
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(code, msg) => write!(f, "Conflict ({}): {}", code, msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects carrying the error envelope.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                log::error!("{}", self);
            }
            _ => log::debug!("request failed: {}", self),
        }

        let mut response = HttpResponse::build(self.http_status());
        if let AppError::RateLimited(retry_after) = self {
            response.insert_header((header::RETRY_AFTER, retry_after.to_string()));
        }
        response.json(self.envelope())
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// Unique-constraint violations become `Conflict(EMAIL_ALREADY_REGISTERED)` since the
/// email index is the only unique constraint besides the primary key.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AppError::Conflict(
                    ErrorCode::EmailAlreadyRegistered,
                    "Email already registered".into(),
                )
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::ValidationError`.
///
/// Every field error is preserved as `"<field>: <message>"`, ordered by field name.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        AppError::ValidationError(flatten_validation_errors(&errors))
    }
}

pub fn flatten_validation_errors(errors: &ValidationErrors) -> Vec<String> {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    fields
        .into_iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| match &e.message {
                Some(msg) => format!("{}: {}", field, msg),
                None => format!("{}: {}", field, e.code),
            })
        })
        .collect()
}

impl From<TokenError> for AppError {
    fn from(error: TokenError) -> AppError {
        match error {
            TokenError::Expired => {
                AppError::Unauthorized(ErrorCode::TokenExpired, "Token has expired".into())
            }
            TokenError::Invalid(_) => {
                AppError::Unauthorized(ErrorCode::InvalidToken, "Invalid token".into())
            }
            TokenError::Signing(msg) => {
                AppError::InternalServerError(format!("Failed to sign token: {}", msg))
            }
        }
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::InternalServerError`.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_error_statuses() {
        let cases = vec![
            (
                AppError::Unauthorized(ErrorCode::NoToken, "No token".into()),
                401,
            ),
            (
                AppError::Forbidden(ErrorCode::PendingApproval, "Pending".into()),
                403,
            ),
            (AppError::AccountRejected(Some("duplicate".into())), 403),
            (AppError::RateLimited(30), 429),
            (AppError::ValidationError(vec!["email: invalid".into()]), 400),
            (AppError::NotFound("User not found".into()), 404),
            (
                AppError::Conflict(ErrorCode::InvalidTransition, "nope".into()),
                409,
            ),
            (AppError::InternalServerError("boom".into()), 500),
        ];

        for (error, status) in cases {
            assert_eq!(error.error_response().status(), status, "{}", error);
        }
    }

    #[actix_rt::test]
    async fn test_rejected_envelope_carries_reason() {
        let error = AppError::AccountRejected(Some("Incomplete documents".into()));
        let body = to_bytes(error.error_response().into_body()).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "ACCOUNT_REJECTED");
        assert_eq!(json["rejectionReason"], "Incomplete documents");
    }

    #[actix_rt::test]
    async fn test_rate_limited_sets_retry_after() {
        let response = AppError::RateLimited(42).error_response();
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "42"
        );
        let body = to_bytes(response.into_body()).await.unwrap();
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["retryAfter"], 42);
        assert_eq!(json["code"], "RATE_LIMIT_EXCEEDED");
    }

    #[actix_rt::test]
    async fn test_internal_error_does_not_leak_detail() {
        let error = AppError::DatabaseError("connection refused at 10.0.0.3:5432".into());
        let body = to_bytes(error.error_response().into_body()).await.unwrap();
        let text = String::from_utf8_lossy(&body);

        assert!(!text.contains("10.0.0.3"));
        assert!(text.contains("INTERNAL_ERROR"));
    }
}
