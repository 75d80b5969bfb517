//! HTTP API handlers for ecp-api

pub mod auth;
pub mod exports;
pub mod extract;
pub mod health;
pub mod n8n;
pub mod projects;
pub mod reprocess;
pub mod results;
pub mod storage;

pub use auth::{auth_middleware, require_owned_project};
pub use exports::export_routes;
pub use health::health_routes;
pub use n8n::n8n_routes;
pub use projects::project_routes;
pub use reprocess::{reprocess_callback_routes, reprocess_routes};
pub use results::result_routes;
pub use storage::storage_routes;
