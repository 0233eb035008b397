//! Persisted user records.
//!
//! `CredentialStore` is the seam between the auth core and persistence. One
//! implementation is picked in `main` and shared through `AppState` for the lifetime
//! of the process.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{ApprovalStatus, NewUser, User};

pub use memory::MemoryCredentialStore;
pub use postgres::PgCredentialStore;

#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Short backend name, reported by the health endpoint.
    fn backend(&self) -> &'static str;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;

    /// `email` is normalized by the store before lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// Fails with `Conflict(EMAIL_ALREADY_REGISTERED)` when the email is taken.
    async fn insert(&self, user: NewUser) -> Result<User, AppError>;

    /// Persists every mutable field of `user` and bumps `updated_at`.
    /// Fails with `NotFound` for an unknown id and `Conflict` for a taken email.
    async fn save(&self, user: &User) -> Result<User, AppError>;

    /// Accounts in the given approval status, oldest first.
    async fn list_by_status(&self, status: ApprovalStatus) -> Result<Vec<User>, AppError>;
}
