//! API types and helpers shared by the service and its clients

pub mod auth;
pub mod types;

pub use auth::secrets_match;
pub use types::*;
