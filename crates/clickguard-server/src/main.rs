//! ClickGuard HTTP Server
//!
//! REST API for tracking clicks and conversions, reviewing queued events and
//! managing the blacklist.

use anyhow::Result;
use clickguard_server::api::{create_router, AppState};
use clickguard_server::config::{LogFormat, ServerConfig};
use clickguard_server::pipeline::init_pipeline;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first, it picks the log format
    let config = ServerConfig::load()?;

    init_tracing(config.log_format)?;
    info!("Loaded configuration: {}", config);

    let pipeline = init_pipeline(&config).await?;
    info!("Tracking pipeline initialized");

    let mut state =
        AppState::new(Arc::new(pipeline)).with_trusted_proxies(config.trusted_proxies.clone());
    match &config.admin_token {
        Some(token) => state = state.with_admin_token(token.as_str()),
        None => tracing::warn!("No admin token configured, review and admin routes are open"),
    }
    let app = create_router(state);

    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);
    info!("  Health check: http://{}/health", addr);
    info!("  Tracking API: http://{}/v1/track", addr);
    info!("  Metrics: http://{}/metrics", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing(format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "clickguard_server=info,clickguard_sdk=info,clickguard_runtime=info,tower_http=debug"
            .into()
    });
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Plain => registry.with(tracing_subscriber::fmt::layer()).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
