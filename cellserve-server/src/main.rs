use anyhow::{Context, Result};
use cellserve_core::clock::{Clock, SystemClock};
use cellserve_runner::StoreBackend;
use cellserve_runner::repository::{
    InMemoryStatusRepository, RedisStatusRepository, StatusRepository,
};
use cellserve_runner::scheduler::JobRunner;
use cellserve_runner::service::CommandBackend;
use cellserve_server::{AppState, ServerConfig, create_router};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "cellserve_server=debug,cellserve_runner=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Cellserve Server...");

    let config = load_config();
    config.validate().context("Invalid configuration")?;
    info!(
        "Loaded configuration: store={:?}, pool_size={}, data_dir={}",
        config.runner.store_backend,
        config.runner.pool_size,
        config.runner.data_dir.display()
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = connect_store(&config, clock.clone()).await?;

    let runner = JobRunner::new(store, clock, config.runner.pool_size);
    let backend = Arc::new(CommandBackend::from_config(&config.runner));
    let state = AppState::new(runner, backend, config.runner.clone());

    // Build router with all API endpoints
    let app = create_router(state.clone(), config.max_upload_bytes);

    info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Waiting for running jobs to finish");
    state.runner.shutdown().await;
    info!("Cellserve Server stopped");

    Ok(())
}

/// Loads configuration from the environment, falling back to defaults
fn load_config() -> ServerConfig {
    match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!("Failed to load config from environment: {}", e);
            warn!("Using default configuration");
            ServerConfig::default()
        }
    }
}

/// Opens the configured status store
async fn connect_store(
    config: &ServerConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn StatusRepository>> {
    let ttl = config.runner.status_ttl;

    match config.runner.store_backend {
        StoreBackend::Redis => {
            info!("Connecting to status store...");
            let store = RedisStatusRepository::connect(&config.runner.redis_url, ttl)
                .await
                .context("Failed to connect to Redis")?;
            info!("Status store connected");
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory status store; statuses are lost on restart");
            Ok(Arc::new(InMemoryStatusRepository::new(ttl, clock)))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
