use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::CredentialStore;
use crate::error::{AppError, ErrorCode};
use crate::models::{normalize_email, ApprovalStatus, NewUser, User};

/// In-process credential store used in development and tests.
///
/// The email uniqueness check and the write happen under the same write lock.
#[derive(Default)]
pub struct MemoryCredentialStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_taken(users: &HashMap<Uuid, User>, email: &str, except: Option<Uuid>) -> bool {
    users
        .values()
        .any(|u| u.email == email && Some(u.id) != except)
}

fn conflict() -> AppError {
    AppError::Conflict(
        ErrorCode::EmailAlreadyRegistered,
        "Email already registered".into(),
    )
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let email = normalize_email(email);
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, AppError> {
        let user = user.into_user();
        let mut users = self.users.write().await;
        if email_taken(&users, &user.email, None) {
            return Err(conflict());
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<User, AppError> {
        let mut updated = user.clone();
        updated.email = normalize_email(&updated.email);
        updated.updated_at = Utc::now();

        let mut users = self.users.write().await;
        if !users.contains_key(&updated.id) {
            return Err(AppError::NotFound("User not found".into()));
        }
        if email_taken(&users, &updated.email, Some(updated.id)) {
            return Err(conflict());
        }
        users.insert(updated.id, updated.clone());
        Ok(updated)
    }

    async fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<User>, AppError> {
        let mut matching: Vec<User> = self
            .users
            .read()
            .await
            .values()
            .filter(|u| !u.is_admin() && u.approval_status == status)
            .cloned()
            .collect();
        matching.sort_by_key(|u| u.created_at);
        Ok(matching)
    }
}
