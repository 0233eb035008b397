pub mod approval;
pub mod csrf;
pub mod extractors;
pub mod middleware;
pub mod password;
pub mod rate_limit;
pub mod service;
pub mod token;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{PublicUser, Role};
use crate::security::validators::NAME_REGEX;

// Re-export necessary items
pub use approval::ApprovalDecision;
pub use csrf::CsrfGuard;
pub use extractors::AuthenticatedUser;
pub use middleware::Authorize;
pub use password::{hash_password, hash_password_with_cost, verify_password};
pub use rate_limit::RateLimiter;
pub use service::AuthService;
pub use token::{Claims, TokenError, TokenService};

/// Represents the payload for a user login request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Represents the payload for a new account registration.
///
/// Password strength and phone format are checked by the service so that every
/// violated rule is reported together.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(
        length(
            min = 2,
            max = 50,
            message = "Name must be between 2 and 50 characters"
        ),
        regex(
            path = "NAME_REGEX",
            message = "Name may only contain letters, spaces, ' . -"
        )
    )]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    /// Defaults to `client`.
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Required when `role` is `admin`.
    #[serde(default)]
    pub admin_code: Option<String>,
}

/// Fields a user (or an admin on their behalf) may change. Absent fields are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(
        length(
            min = 2,
            max = 50,
            message = "Name must be between 2 and 50 characters"
        ),
        regex(
            path = "NAME_REGEX",
            message = "Name may only contain letters, spaces, ' . -"
        )
    )]
    pub name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsRequest {
    pub permissions: Vec<String>,
}

/// Successful login: the bearer token, its lifetime in seconds and the account it
/// belongs to.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: i64,
    pub user: PublicUser,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    fn register(name: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: "Jardim#2024".to_string(),
            role: None,
            phone: None,
            admin_code: None,
        }
    }

    #[test]
    fn test_login_request_validation() {
        let valid_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(valid_login.validate().is_ok());

        let invalid_email_login = LoginRequest {
            email: "testexample.com".to_string(),
            password: "password123".to_string(),
        };
        assert!(invalid_email_login.validate().is_err());

        let empty_password_login = LoginRequest {
            email: "test@example.com".to_string(),
            password: String::new(),
        };
        assert!(empty_password_login.validate().is_err());
    }

    #[test]
    fn test_register_request_validation() {
        assert!(register("Inês Costa", "ines@garden.pt").validate().is_ok());
        assert!(register("O'Neill-Smith Jr.", "jr@garden.pt").validate().is_ok());

        // Digits are not allowed in names
        assert!(register("R2D2", "r2@garden.pt").validate().is_err());
        assert!(register("A", "a@garden.pt").validate().is_err());
        assert!(register("Valid Name", "not-an-email").validate().is_err());
    }

    #[test]
    fn test_register_request_uses_camel_case() {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Admin Person",
            "email": "admin@garden.pt",
            "password": "Jardim#2024",
            "role": "admin",
            "adminCode": "ABCD1234"
        }))
        .unwrap();

        assert_eq!(request.role, Some(Role::Admin));
        assert_eq!(request.admin_code.as_deref(), Some("ABCD1234"));
        assert_eq!(request.phone, None);
    }

    #[test]
    fn test_update_profile_skips_absent_fields() {
        let update = UpdateProfileRequest {
            phone: Some("+351912345678".into()),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let update = UpdateProfileRequest {
            name: Some("x".into()),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }
}
