mod config;
mod document;
mod errors;
mod gateway;
mod identity;
mod payload;
mod routes;
mod skills;
mod state;
mod storage;
mod workflow;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gateway::http::HttpGateway;
use crate::gateway::Gateways;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));

    // One client serves extraction, matching and the JD store
    let gateway = HttpGateway::new(
        config.api_url.clone(),
        config.api_token.clone(),
        config.gateway_timeout,
    )
    .context("Failed to build service client")?;
    info!(
        "Service client ready: {} (timeout {}s)",
        config.api_url,
        config.gateway_timeout.as_secs()
    );

    let store = SessionStore::new(config.session_dir.clone());
    info!("Session snapshots in {}", store.dir().display());

    let state = AppState::new(Gateways::shared(Arc::new(gateway)), store);

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
