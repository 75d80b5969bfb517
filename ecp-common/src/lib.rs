//! # ECP Common Library
//!
//! Shared code for the ECP service and its review client:
//! - Domain models (projects, result rows, events) and their invariants
//! - API request/response types
//! - Configuration loading
//! - Database schema initialization
//! - Shared-secret verification

pub mod api;
pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;

pub use error::{Error, Result};
