//! Account flows: registration, login, session resolution and admin transitions.

use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;
use validator::Validate;

use super::approval::{self, ApprovalDecision};
use super::password::{hash_password_with_cost, verify_password, DEFAULT_BCRYPT_COST};
use super::token::TokenService;
use super::{LoginRequest, RegisterRequest, UpdateProfileRequest};
use crate::error::{flatten_validation_errors, AppError, ErrorCode};
use crate::models::{normalize_email, ApprovalStatus, NewUser, Role, User};
use crate::security::csrf::tokens_match;
use crate::security::sanitize::strip_tags;
use crate::security::validators::{
    validate_admin_code, validate_password_strength, validate_phone, validate_text_length,
    PhonePattern,
};
use crate::store::CredentialStore;

pub const PERMISSION_MAX_LENGTH: usize = 64;

/// Checked against when the email is unknown, so both login failures pay one bcrypt
/// verification.
const DUMMY_PASSWORD: &str = "gardengate-no-such-account";

/// A freshly created account. Admin registrations are signed in immediately.
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub token: Option<String>,
}

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    tokens: TokenService,
    admin_invite_code: Option<String>,
    phone_pattern: PhonePattern,
    bcrypt_cost: u32,
    dummy_hash: OnceCell<String>,
}

fn invalid_credentials() -> AppError {
    AppError::Unauthorized(
        ErrorCode::InvalidCredentials,
        "Invalid email or password".into(),
    )
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Refuses disabled accounts and, for non-admins, accounts that are not approved.
pub fn ensure_can_access(user: &User) -> Result<(), AppError> {
    if !user.is_active {
        return Err(AppError::Forbidden(
            ErrorCode::AccountDisabled,
            "Your account has been disabled".into(),
        ));
    }
    match user.effective_approval() {
        ApprovalStatus::Approved => Ok(()),
        ApprovalStatus::Pending => Err(AppError::Forbidden(
            ErrorCode::PendingApproval,
            "Your account is awaiting administrator approval".into(),
        )),
        ApprovalStatus::Rejected => Err(AppError::AccountRejected(user.rejection_reason.clone())),
    }
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, tokens: TokenService) -> Self {
        Self {
            store,
            tokens,
            admin_invite_code: None,
            phone_pattern: PhonePattern::default(),
            bcrypt_cost: DEFAULT_BCRYPT_COST,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Without an invite code, admin self-registration is refused.
    pub fn with_admin_invite_code(mut self, code: Option<String>) -> Self {
        self.admin_invite_code = code;
        self
    }

    pub fn with_phone_pattern(mut self, pattern: PhonePattern) -> Self {
        self.phone_pattern = pattern;
        self
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn store_backend(&self) -> &'static str {
        self.store.backend()
    }

    fn check_phone(&self, phone: Option<&str>, errors: &mut Vec<String>) {
        if let Some(phone) = phone {
            if !validate_phone(phone, &self.phone_pattern) {
                errors.push("phone: Invalid phone number".to_string());
            }
        }
    }

    fn check_admin_code(&self, code: Option<&str>) -> Result<(), AppError> {
        let accepted = match (self.admin_invite_code.as_deref(), code) {
            (Some(expected), Some(given)) => {
                validate_admin_code(given) && tokens_match(expected, given)
            }
            _ => false,
        };
        if accepted {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                ErrorCode::InvalidAdminCode,
                "Invalid administrator invitation code".into(),
            ))
        }
    }

    /// Creates an account. Clients and collaborators start `pending`; admins need
    /// the invite code and start `approved` with a session token.
    pub async fn register(&self, request: RegisterRequest) -> Result<Registration, AppError> {
        let request = RegisterRequest {
            name: request.name.trim().to_string(),
            email: normalize_email(&request.email),
            phone: trimmed(request.phone.as_deref()),
            ..request
        };

        let mut errors = match request.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        };
        if let Err(rules) = validate_password_strength(&request.password) {
            errors.extend(rules.iter().map(|r| format!("password: {}", r)));
        }
        self.check_phone(request.phone.as_deref(), &mut errors);
        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }

        let role = request.role.unwrap_or_default();
        if role == Role::Admin {
            self.check_admin_code(request.admin_code.as_deref())?;
        }

        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::Conflict(
                ErrorCode::EmailAlreadyRegistered,
                "Email already registered".into(),
            ));
        }

        let password_hash = hash_password_with_cost(&request.password, self.bcrypt_cost)?;
        let user = self
            .store
            .insert(NewUser {
                name: strip_tags(&request.name),
                email: request.email,
                password_hash,
                role,
                approval_status: if role == Role::Admin {
                    ApprovalStatus::Approved
                } else {
                    ApprovalStatus::Pending
                },
                is_active: true,
                email_verified: false,
                phone: request.phone,
            })
            .await?;

        log::info!("registered {} account {}", user.role, user.id);

        let token = if user.is_admin() {
            Some(self.tokens.issue(user.id)?)
        } else {
            None
        };
        Ok(Registration { user, token })
    }

    /// Checks credentials, then the same active/approval gates the middleware
    /// applies, and issues a token.
    pub async fn login(&self, request: LoginRequest) -> Result<(String, User), AppError> {
        let request = LoginRequest {
            email: normalize_email(&request.email),
            ..request
        };
        request.validate()?;

        let user = match self.store.find_by_email(&request.email).await? {
            Some(user) => user,
            None => {
                let cost = self.bcrypt_cost;
                let dummy = self
                    .dummy_hash
                    .get_or_try_init(|| async move {
                        hash_password_with_cost(DUMMY_PASSWORD, cost)
                    })
                    .await?;
                verify_password(&request.password, dummy);
                log::warn!("login attempt for unknown email");
                return Err(invalid_credentials());
            }
        };
        if !verify_password(&request.password, &user.password_hash) {
            log::warn!("failed login for account {}", user.id);
            return Err(invalid_credentials());
        }

        ensure_can_access(&user)?;
        let token = self.tokens.issue(user.id)?;
        Ok((token, user))
    }

    /// Verifies a bearer token and loads its account, applying the active and
    /// approval gates.
    pub async fn resolve_session(&self, token: &str) -> Result<User, AppError> {
        let claims = self.tokens.verify(token)?;
        let user = self.store.find_by_id(claims.sub).await?.ok_or_else(|| {
            AppError::Unauthorized(ErrorCode::UserNotFound, "User no longer exists".into())
        })?;
        ensure_can_access(&user)?;
        Ok(user)
    }

    async fn load(&self, id: Uuid) -> Result<User, AppError> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))
    }

    fn ensure_self_or_admin(actor: &User, id: Uuid) -> Result<(), AppError> {
        if actor.is_admin() || actor.id == id {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                ErrorCode::AccessDenied,
                "You can only access your own account".into(),
            ))
        }
    }

    pub async fn get_user(&self, actor: &User, id: Uuid) -> Result<User, AppError> {
        Self::ensure_self_or_admin(actor, id)?;
        self.load(id).await
    }

    /// Accounts waiting for a decision, oldest first.
    pub async fn list_pending(&self) -> Result<Vec<User>, AppError> {
        self.store.list_by_status(ApprovalStatus::Pending).await
    }

    pub async fn approve(&self, actor: &User, id: Uuid) -> Result<User, AppError> {
        let mut target = self.load(id).await?;
        approval::decide(actor, &mut target, ApprovalDecision::Approve)?;
        self.store.save(&target).await
    }

    pub async fn reject(&self, actor: &User, id: Uuid, reason: String) -> Result<User, AppError> {
        let mut target = self.load(id).await?;
        approval::decide(actor, &mut target, ApprovalDecision::Reject { reason })?;
        self.store.save(&target).await
    }

    pub async fn set_active(&self, actor: &User, id: Uuid, active: bool) -> Result<User, AppError> {
        let mut target = self.load(id).await?;
        approval::set_active(actor, &mut target, active)?;
        self.store.save(&target).await
    }

    pub async fn promote(&self, actor: &User, id: Uuid, role: Role) -> Result<User, AppError> {
        let mut target = self.load(id).await?;
        approval::change_role(actor, &mut target, role)?;
        self.store.save(&target).await
    }

    /// Replaces the permission set. Entries are trimmed, deduplicated and sorted.
    pub async fn set_permissions(
        &self,
        actor: &User,
        id: Uuid,
        permissions: Vec<String>,
    ) -> Result<User, AppError> {
        if !actor.is_admin() {
            return Err(AppError::Forbidden(
                ErrorCode::InsufficientPermissions,
                "Administrator role required".into(),
            ));
        }

        let mut cleaned: Vec<String> = permissions
            .iter()
            .map(|p| p.trim().to_string())
            .collect();
        let errors: Vec<String> = cleaned
            .iter()
            .filter(|p| validate_text_length(p, 1, PERMISSION_MAX_LENGTH).is_err())
            .map(|p| format!("permissions: Invalid permission '{}'", strip_tags(p)))
            .collect();
        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }
        cleaned.sort();
        cleaned.dedup();

        let mut target = self.load(id).await?;
        target.permissions = cleaned;
        log::info!("permissions of {} set by {}", target.id, actor.id);
        self.store.save(&target).await
    }

    pub async fn update_profile(
        &self,
        actor: &User,
        id: Uuid,
        update: UpdateProfileRequest,
    ) -> Result<User, AppError> {
        Self::ensure_self_or_admin(actor, id)?;

        let update = UpdateProfileRequest {
            name: update.name.map(|n| n.trim().to_string()),
            email: update.email.map(|e| normalize_email(&e)),
            phone: update.phone.map(|p| p.trim().to_string()),
        };
        let mut errors = match update.validate() {
            Ok(()) => Vec::new(),
            Err(e) => flatten_validation_errors(&e),
        };
        self.check_phone(update.phone.as_deref().filter(|p| !p.is_empty()), &mut errors);
        if !errors.is_empty() {
            return Err(AppError::ValidationError(errors));
        }

        let mut target = self.load(id).await?;
        if let Some(email) = update.email {
            if email != target.email {
                if let Some(other) = self.store.find_by_email(&email).await? {
                    if other.id != target.id {
                        return Err(AppError::Conflict(
                            ErrorCode::EmailAlreadyRegistered,
                            "Email already registered".into(),
                        ));
                    }
                }
                target.email = email;
                target.email_verified = false;
            }
        }
        if let Some(name) = update.name {
            target.name = strip_tags(&name);
        }
        if let Some(phone) = update.phone {
            // An empty string clears the phone number
            target.phone = if phone.is_empty() { None } else { Some(phone) };
        }
        self.store.save(&target).await
    }

    /// Creates the configured admin account if no account holds that email.
    /// Returns the new account, or `None` when the admin already exists. An email
    /// held by a non-admin account is a conflict.
    pub async fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Option<User>, AppError> {
        if let Some(existing) = self.store.find_by_email(email).await? {
            if !existing.is_admin() {
                return Err(AppError::Conflict(
                    ErrorCode::EmailAlreadyRegistered,
                    format!(
                        "ADMIN_EMAIL belongs to non-admin account {}",
                        existing.id
                    ),
                ));
            }
            return Ok(None);
        }

        if let Err(rules) = validate_password_strength(password) {
            return Err(AppError::ValidationError(
                rules
                    .iter()
                    .map(|r| format!("ADMIN_PASSWORD: {}", r))
                    .collect(),
            ));
        }

        let password_hash = hash_password_with_cost(password, self.bcrypt_cost)?;
        let user = self
            .store
            .insert(NewUser {
                name: strip_tags(name),
                email: email.to_string(),
                password_hash,
                role: Role::Admin,
                approval_status: ApprovalStatus::Approved,
                is_active: true,
                email_verified: true,
                phone: None,
            })
            .await?;
        log::info!("bootstrap admin {} created", user.id);
        Ok(Some(user))
    }
}
