use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jobfy_client::{EnvCredentials, ReqwestClient, default_registry};
use jobfy_core::{MemorySink, OrchestratorConfig, ScrapeOrchestrator};
use jobfy_server::routes;
use jobfy_server::state::AppState;

/// Scrape requests are tiny; anything larger is rejected.
const MAX_BODY_BYTES: usize = 16 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("jobfy=info".parse()?))
        .with_target(false)
        .init();

    let api_key =
        std::env::var("JOBFY_SERVER_API_KEY").context("JOBFY_SERVER_API_KEY must be set")?;
    let port = std::env::var("JOBFY_SERVER_PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");

    let max_sites = env_parse("JOBFY_MAX_CONCURRENT_SITES", 5)?;
    let timeout = env_parse("JOBFY_TIMEOUT_SECS", 30)?;

    let registry = default_registry().map_err(|e| anyhow::anyhow!(e))?;
    let client = ReqwestClient::with_timeout(Duration::from_secs(timeout as u64))
        .context("Failed to create HTTP client")?;
    let orchestrator =
        ScrapeOrchestrator::new(registry, client, EnvCredentials::new(), MemorySink::new())
            .with_config(OrchestratorConfig::default().with_max_concurrent_sites(max_sites));

    let state = Arc::new(AppState::new(orchestrator, api_key));

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn env_parse(name: &str, default: usize) -> anyhow::Result<usize> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a positive integer, got '{value}'")),
        Err(_) => Ok(default),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for CTRL+C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
