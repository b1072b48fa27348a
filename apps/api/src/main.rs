mod config;
mod db;
mod document;
mod errors;
mod models;
mod optimize;
mod routes;
mod state;
mod storage;
mod versions;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::document::store::StoreOptions;
use crate::optimize::KeywordOptimizer;
use crate::routes::build_router;
use crate::state::{AppState, Sessions};
use crate::storage::local::FileStore;
use crate::storage::postgres::PgRemoteStore;
use crate::versions::VersionManager;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting folio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Local fallback store backing the per-user current-document slots
    let local = Arc::new(FileStore::new(&config.data_dir)?);
    info!("Local fallback store at {}", config.data_dir.display());

    // Remote record store
    let remote = Arc::new(PgRemoteStore::new(db.clone()));

    // Per-user session stores with the configured autosave window
    let store_opts = StoreOptions {
        debounce: Duration::from_millis(config.autosave_debounce_ms),
        ..StoreOptions::default()
    };
    let sessions = Sessions::new(remote.clone(), local, store_opts);

    // Version manager (remote-only snapshots)
    let versions = Arc::new(VersionManager::new(remote));

    // Job-targeting optimizer (KeywordOptimizer; deterministic, no model calls)
    let optimizer = Arc::new(KeywordOptimizer);

    // Build app state
    let state = AppState {
        db,
        config: config.clone(),
        sessions,
        versions,
        optimizer,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
