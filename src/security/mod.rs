//! Client security layer.
//!
//! Pure validators and sanitizers, CSRF session tokens, fingerprint-bound token
//! storage, client-side attempt limiting and a bounded security event log. The
//! [`ClientSecurity`] runtime composes them for a client application; none of it
//! depends on a particular storage medium.

pub mod csrf;
pub mod event_log;
pub mod rate_limit;
pub mod sanitize;
pub mod storage;
pub mod token_storage;
pub mod validators;

use chrono::{DateTime, Utc};
use serde_json::json;
use std::fmt;

use crate::auth::{LoginRequest, RegisterRequest};
use crate::models::Role;
use csrf::CsrfSession;
use event_log::{SecurityEventLog, Severity};
use rate_limit::ClientRateLimiter;
use storage::KeyValueStorage;
use token_storage::{DeviceTraits, SecureTokenStorage, TokenLookup};
use validators::PhonePattern;

pub use event_log::SecurityEvent;
pub use storage::MemoryStorage;

pub const LOGIN_ACTION: &str = "login";
pub const REGISTER_ACTION: &str = "register";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Too many attempts; retry after the given number of seconds.
    RateLimited(u64),
    /// Every violated input rule.
    Invalid(Vec<String>),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ClientError::RateLimited(secs) => write!(f, "Too many attempts, retry in {}s", secs),
            ClientError::Invalid(errors) => write!(f, "{}", errors.join("; ")),
        }
    }
}

/// Raw registration form values as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub admin_code: Option<String>,
}

pub struct ClientSecurity<S> {
    csrf: CsrfSession,
    tokens: SecureTokenStorage<S>,
    events: SecurityEventLog,
    limiter: ClientRateLimiter,
    phone_pattern: PhonePattern,
}

impl<S: KeyValueStorage> ClientSecurity<S> {
    pub fn new(storage: S) -> Self {
        Self {
            csrf: CsrfSession::new(),
            tokens: SecureTokenStorage::new(storage),
            events: SecurityEventLog::new(),
            limiter: ClientRateLimiter::default(),
            phone_pattern: PhonePattern::default(),
        }
    }

    pub fn with_limiter(mut self, limiter: ClientRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_phone_pattern(mut self, pattern: PhonePattern) -> Self {
        self.phone_pattern = pattern;
        self
    }

    pub fn events(&self) -> &SecurityEventLog {
        &self.events
    }

    pub fn csrf(&self) -> &CsrfSession {
        &self.csrf
    }

    fn guard(&mut self, action: &str, now: DateTime<Utc>) -> Result<(), ClientError> {
        self.limiter.attempt(action, now).map(|_| ()).map_err(|retry| {
            self.events.record_at(
                "rate_limit_triggered",
                Severity::Medium,
                json!({ "action": action, "retryAfter": retry }),
                now,
            );
            ClientError::RateLimited(retry)
        })
    }

    /// Validates and normalizes login input, counting the attempt.
    pub fn prepare_login(
        &mut self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<LoginRequest, ClientError> {
        let mut errors = Vec::new();
        if !validators::validate_email(email) {
            errors.push("email: Invalid email address".to_string());
        }
        if password.is_empty() {
            errors.push("password: Password is required".to_string());
        }
        if !errors.is_empty() {
            return Err(ClientError::Invalid(errors));
        }

        self.guard(LOGIN_ACTION, now)?;
        Ok(LoginRequest {
            email: email.trim().to_lowercase(),
            password: password.to_string(),
        })
    }

    /// Validates every field, reporting all violations, then strips tags from free
    /// text. Values are sent unescaped so the server sees what was validated.
    pub fn prepare_registration(
        &mut self,
        form: &RegistrationForm,
        now: DateTime<Utc>,
    ) -> Result<RegisterRequest, ClientError> {
        let mut errors = Vec::new();
        if !validators::validate_name(&form.name) {
            errors.push("name: Name may only contain letters, spaces, ' . -".to_string());
        }
        if !validators::validate_email(&form.email) {
            errors.push("email: Invalid email address".to_string());
        }
        if let Err(rules) = validators::validate_password_strength(&form.password) {
            errors.extend(rules.iter().map(|r| format!("password: {}", r)));
        }
        if let Some(phone) = form.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            if !validators::validate_phone(phone, &self.phone_pattern) {
                errors.push("phone: Invalid phone number".to_string());
            }
        }
        if form.role == Role::Admin {
            match form.admin_code.as_deref() {
                Some(code) if validators::validate_admin_code(code) => {}
                _ => errors.push("adminCode: Admin code must be 8 letters or digits".to_string()),
            }
        }
        if !errors.is_empty() {
            return Err(ClientError::Invalid(errors));
        }

        self.guard(REGISTER_ACTION, now)?;
        Ok(RegisterRequest {
            name: sanitize::strip_tags(&form.name),
            email: form.email.trim().to_lowercase(),
            password: form.password.clone(),
            role: Some(form.role),
            phone: form
                .phone
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            admin_code: form.admin_code.clone(),
        })
    }

    pub fn record_login_failure(&mut self, email: &str, code: &str, now: DateTime<Utc>) {
        self.events.record_at(
            "login_failed",
            Severity::Medium,
            json!({ "email": email, "code": code }),
            now,
        );
    }

    pub fn record_permission_denied(&mut self, path: &str, code: &str, now: DateTime<Utc>) {
        self.events.record_at(
            "permission_denied",
            Severity::High,
            json!({ "path": path, "code": code }),
            now,
        );
    }

    /// Stores the session token, clears the login counter and rotates the CSRF token.
    pub fn login_succeeded(&mut self, token: &str, device: &DeviceTraits, now: DateTime<Utc>) {
        self.tokens.store(token, device, now);
        self.limiter.reset(LOGIN_ACTION);
        self.csrf.rotate();
        self.events
            .record_at("login_succeeded", Severity::Low, json!({}), now);
    }

    pub fn session_token(&mut self, device: &DeviceTraits, now: DateTime<Utc>) -> Option<String> {
        match self.tokens.retrieve(device, now) {
            TokenLookup::Valid(token) => Some(token),
            TokenLookup::Missing => None,
            TokenLookup::Purged(reason) => {
                self.events.record_at(
                    "token_purged",
                    Severity::Medium,
                    json!({ "reason": reason.as_str() }),
                    now,
                );
                None
            }
        }
    }

    /// Headers for an outgoing request: bearer token when a session exists and the
    /// CSRF header for mutating methods.
    pub fn request_headers(
        &mut self,
        method: &str,
        device: &DeviceTraits,
        now: DateTime<Utc>,
    ) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(token) = self.session_token(device, now) {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        if let Some((name, value)) = self.csrf.header_for(method) {
            headers.push((name.to_string(), value));
            headers.push(("Cookie".to_string(), format!("{}={}", csrf::CSRF_COOKIE, self.csrf.token())));
        }
        headers
    }

    /// Discards the session token locally; the server keeps no session state.
    pub fn logout(&mut self, now: DateTime<Utc>) {
        self.tokens.clear();
        self.csrf.rotate();
        self.events.record_at("logout", Severity::Low, json!({}), now);
    }
}
