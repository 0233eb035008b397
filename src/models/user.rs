use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Coarse role used for RBAC decisions.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A customer requesting gardening services.
    #[default]
    Client,
    /// Platform administrator. Implicitly approved, bypasses approval and ownership gating.
    Admin,
    /// A gardener or partner working on client projects.
    Collaborator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
            Role::Collaborator => "collaborator",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "admin" => Ok(Role::Admin),
            "collaborator" => Ok(Role::Collaborator),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Account approval lifecycle for client and collaborator accounts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApprovalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            other => Err(format!("unknown approval status '{}'", other)),
        }
    }
}

/// A user record as held by the credential store.
///
/// `password_hash` is never serialized; use [`PublicUser`] for responses.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    /// Always trimmed and lower-cased.
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    /// Set only while `approval_status` is `Rejected`.
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    /// Fine-grained permissions, additive to the role.
    pub permissions: Vec<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Admins are treated as approved whatever the stored status says.
    pub fn effective_approval(&self) -> ApprovalStatus {
        if self.is_admin() {
            ApprovalStatus::Approved
        } else {
            self.approval_status
        }
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.is_admin() || self.permissions.iter().any(|p| p == permission)
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

/// Data required to create a user. The store assigns id and timestamps.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub is_active: bool,
    pub email_verified: bool,
    pub phone: Option<String>,
}

impl NewUser {
    pub fn into_user(self) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: self.name,
            email: normalize_email(&self.email),
            password_hash: self.password_hash,
            role: self.role,
            approval_status: self.approval_status,
            rejection_reason: None,
            is_active: self.is_active,
            email_verified: self.email_verified,
            permissions: Vec::new(),
            phone: self.phone,
            created_at: now,
            updated_at: now,
        }
    }
}

/// The client-facing view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub is_active: bool,
    pub email_verified: bool,
    pub permissions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            approval_status: user.effective_approval(),
            rejection_reason: user.rejection_reason.clone(),
            is_active: user.is_active,
            email_verified: user.email_verified,
            permissions: user.permissions.clone(),
            phone: user.phone.clone(),
            created_at: user.created_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
