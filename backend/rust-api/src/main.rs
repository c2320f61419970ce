use std::sync::Arc;

use anyhow::Context;
use finwell_api::{config::Config, create_router, services::AppState, utils::telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let provider = telemetry::init("finwell-api")?;

    tracing::info!("Starting finwell API");

    let config = Config::load().context("Failed to load configuration")?;
    tracing::info!(
        env = %config.app_env,
        storage = %config.storage_backend,
        "Configuration loaded"
    );

    let bind_addr = config.bind_addr.clone();
    let app_state = Arc::new(
        AppState::new(config)
            .await
            .context("Failed to initialize application state")?,
    );

    let app = create_router(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    telemetry::shutdown(provider);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
