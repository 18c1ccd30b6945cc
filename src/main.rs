use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use schoolbox_api::app::{router, AppState};
use schoolbox_api::branding::HttpImageSource;
use schoolbox_api::config::AppConfig;
use schoolbox_api::database::{InMemorySchoolStore, PgSchoolStore, SchoolStore};
use schoolbox_api::services::LocalBlobStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("schoolbox_api=info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env();
    config.validate().context("invalid configuration")?;
    tracing::info!("Starting Schoolbox API in {:?} mode", config.environment);

    let store: Arc<dyn SchoolStore> = match config.database.url {
        Some(_) => Arc::new(
            PgSchoolStore::connect(&config.database)
                .await
                .context("failed to connect to database")?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory school store");
            Arc::new(InMemorySchoolStore::new())
        }
    };

    let images = HttpImageSource::from_config(&config.theme).context("failed to build HTTP client")?;
    let blobs = LocalBlobStore::from_config(&config.storage).context("invalid storage configuration")?;

    let port = config.api.port;
    let state = AppState::new(config, store, Arc::new(images), Arc::new(blobs))
        .context("failed to initialise JWT verification")?;
    let app = router(state);

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Schoolbox API listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Schoolbox API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
