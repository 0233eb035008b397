pub mod user;

pub use user::{normalize_email, ApprovalStatus, NewUser, PublicUser, Role, User};
