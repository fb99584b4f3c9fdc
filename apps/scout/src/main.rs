mod cache;
mod config;
mod discovery;
mod errors;
mod location;
mod models;
mod platform;
mod routes;
mod settings;
mod skills;
mod state;
#[cfg(test)]
mod testing;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::discovery::EnrichmentOrchestrator;
use crate::platform::github::GitHubClient;
use crate::platform::RateLimiter;
use crate::routes::build_router;
use crate::settings::DiscoverySettings;
use crate::state::AppState;

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

    info!("Starting Scout v{}", env!("CARGO_PKG_VERSION"));

    // Discovery settings: built-in defaults, optionally overridden from file
    let settings = DiscoverySettings::load(config.settings_path.as_deref())?;

    // Shared quota state for every platform call
    let limiter = Arc::new(RateLimiter::new(settings.rate_limit.clone()));

    // Initialize GitHub client
    let github = GitHubClient::new(
        config.github_api_url.clone(),
        config.github_token.clone(),
        Duration::from_secs(settings.platform.request_timeout_secs),
        limiter.clone(),
    )?;
    info!("GitHub client initialized ({})", config.github_api_url);

    // Initialize Redis; an unreachable server degrades to the in-process store on first use
    let redis = redis::Client::open(config.redis_url.clone())?;
    let cache = Arc::new(CacheLayer::new(Some(redis), settings.cache.clone()));
    info!("Redis client initialized");

    let orchestrator = Arc::new(EnrichmentOrchestrator::new(
        Arc::new(github),
        limiter,
        cache,
        settings,
    ));

    // Build app state
    let state = AppState { orchestrator };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
