//! fnhost control plane
//!
//! Tracks applications and their immutable deploys, and moves each
//! application's active deploy pointer on deploy and rollback.
//!
//! **Components:**
//! - `storage`: the `Store` trait plus in-memory and Redis backends
//! - `cache`: the compiled module cache evicted on rollback
//! - `service`: `ControlPlane` and the application registry
//! - `versioning`: deploy creation and rollback
//! - `handlers`: REST API
//! - `config`: configuration management

pub mod cache;
pub mod config;
pub mod handlers;
pub mod middleware;
pub mod service;
pub mod storage;
pub mod versioning;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use cache::{InMemoryModCache, ModCache};
pub use config::{Config, StorageBackend};
pub use handlers::AppState;
pub use service::ControlPlane;
pub use storage::{InMemoryStore, RedisStore, Store};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let deploy_limit = DefaultBodyLimit::max(state.max_deploy_bytes);
    let shared_state = Arc::new(state);

    Router::new()
        .route("/status", get(handlers::status_handler))
        .route("/application", post(handlers::create_application_handler))
        .route("/application/{app_id}", get(handlers::get_application_handler))
        .route(
            "/application/{app_id}/deploy",
            post(handlers::create_deploy_handler).layer(deploy_limit),
        )
        .route(
            "/application/{app_id}/rollback",
            post(handlers::rollback_handler),
        )
        .route("/application/{app_id}/logs", get(handlers::get_logs_handler))
        .route("/deploy/{deploy_id}", get(handlers::get_deploy_handler))
        .with_state(shared_state)
        .layer(axum::middleware::from_fn(middleware::log_request_timing))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
