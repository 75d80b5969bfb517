//! ecp-api library - project registry, storage signing, automation relay
//! and report exports for the carbon estimation front end

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use ecp_common::config::AppConfig;
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod error;
pub mod pagination;
pub mod report;
pub mod services;

pub use error::{ApiError, ApiResult};
pub use services::Services;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved configuration
    pub config: Arc<AppConfig>,
    /// Outbound collaborators (identity, storage, automation, PDF)
    pub services: Services,
    /// Server start, for uptime reporting
    pub startup_time: Instant,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig, services: Services) -> Self {
        Self {
            db,
            config: Arc::new(config),
            services,
            startup_time: Instant::now(),
        }
    }
}

/// Build application router
///
/// User endpoints sit behind the bearer-token middleware. Health, build info
/// and the automation callbacks are public; callbacks check their own
/// shared-secret headers.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::storage_routes())
        .merge(api::project_routes())
        .merge(api::result_routes())
        .merge(api::reprocess_routes())
        .merge(api::export_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::health_routes())
        .merge(api::n8n_routes())
        .merge(api::reprocess_callback_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
