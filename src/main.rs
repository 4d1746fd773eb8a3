//! Habitlog server binary

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use habitlog::api::{create_router, AppState};
use habitlog::config::{AppConfig, LogFormat};
use habitlog::store::{create_store, RowStore, StoreConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config)?;

    // Missing store credentials are fatal; never serve without a store
    let store_config = config.store_runtime().map_err(|err| {
        tracing::error!(error = %err, "invalid store configuration");
        err.context("invalid store configuration")
    })?;
    let backend = store_config.backend_name();
    if matches!(store_config, StoreConfig::Memory) {
        tracing::warn!("using the in-memory row store; data is lost on restart");
    }

    let store: Arc<dyn RowStore> =
        Arc::from(create_store(store_config).context("failed to create row store")?);
    tracing::info!(%backend, "Row store initialised");

    let router = create_router(AppState::new(store, backend));

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    tracing::info!(%addr, "Listening for HTTP traffic");

    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.logging.level.clone()))
        .unwrap_or_else(|_| EnvFilter::new("habitlog=info,tower_http=info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format {
        LogFormat::Json => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    Ok(())
}
