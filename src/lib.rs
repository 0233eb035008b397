#![doc = "The `gardengate` library crate."]
#![doc = ""]
#![doc = "Authentication, role-based authorization and account approval for a multi-role"]
#![doc = "gardening services platform: token issuance, the request authorization chain,"]
#![doc = "the approval state machine, credential stores, HTTP routes and the client"]
#![doc = "security layer. The server binary (`main.rs`) wires these together."]

pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;

pub use crate::error::AppError;
pub use crate::state::AppState;
