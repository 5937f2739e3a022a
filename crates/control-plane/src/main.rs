//! fnhost control plane
//!
//! REST API for managing applications, deploys and rollbacks

use std::sync::Arc;

use anyhow::{Context, Result};
use control_plane::{
    create_router, AppState, Config, ControlPlane, InMemoryModCache, InMemoryStore, RedisStore,
    StorageBackend, Store,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "control_plane=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting fnhost control plane");

    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Storage backend: {:?}", config.storage_backend);
    info!("Function base URL: {}", config.function_base_url);

    let store: Arc<dyn Store> = match config.storage_backend {
        StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        StorageBackend::Redis => {
            info!("Redis URL: {}", config.redis_url);
            Arc::new(
                RedisStore::new(&config.redis_url)
                    .await
                    .context("Failed to initialize storage")?,
            )
        }
    };

    let plane = ControlPlane::new(
        store,
        Arc::new(InMemoryModCache::new()),
        config.function_base_url.clone(),
        config.name_bounds,
    );

    let app = create_router(AppState {
        plane,
        max_deploy_bytes: config.max_deploy_bytes,
    });

    let listener = tokio::net::TcpListener::bind(config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Control plane running on http://{}", config.api_address());

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
