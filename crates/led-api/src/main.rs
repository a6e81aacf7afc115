//! LED REST API server.

use led_api::server::{self, AppState};
use led_core::{LedConfig, LedService};
use led_store::{InMemoryKvStore, KvStore};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(feature = "sqlite")]
fn open_backend(config: &LedConfig) -> Result<Arc<dyn KvStore>, BoxError> {
    match &config.db_path {
        Some(path) => {
            tracing::info!(path = %path.display(), "using SQLite store");
            Ok(Arc::new(led_store::SqliteKvStore::new(path)?))
        }
        None => Ok(Arc::new(InMemoryKvStore::new())),
    }
}

#[cfg(not(feature = "sqlite"))]
fn open_backend(config: &LedConfig) -> Result<Arc<dyn KvStore>, BoxError> {
    if let Some(path) = &config.db_path {
        tracing::warn!(
            path = %path.display(),
            "LED_DB_PATH is set but this build has no sqlite feature; data stays in memory"
        );
    }
    Ok(Arc::new(InMemoryKvStore::new()))
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = LedConfig::from_env();
    let kv = open_backend(&config)?;
    let addr: SocketAddr = config.listen.parse()?;
    let service = Arc::new(LedService::new(kv, config));
    service.bootstrap().await?;

    let app = server::router(Arc::new(AppState { service }));
    tracing::info!("LED API listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service(),
    )
    .await?;
    Ok(())
}
