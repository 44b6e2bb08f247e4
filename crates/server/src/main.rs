use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gamehost_core::{
    load_config, validate_config, ContainerEngine, ContainerRuntime, DockerCliEngine, FileService,
    FsFileService, PortAllocator, ServerOrchestrator, ServerStore, SqliteServerStore,
    StatusSweeper,
};

use gamehost_server::api::create_router;
use gamehost_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("GAMEHOST_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!(
        "Container ports: {}-{} ({})",
        config.servers.min_container_port,
        config.servers.max_container_port,
        config.servers.external_address
    );

    // Server store, seeded with the configured port range
    let store: Arc<dyn ServerStore> = Arc::new(
        SqliteServerStore::new(&config.database.path).context("Failed to create server store")?,
    );
    store
        .save_server_config(&config.servers)
        .context("Failed to persist server config")?;
    info!("Server store initialized");

    // File storage
    std::fs::create_dir_all(&config.files.root)
        .with_context(|| format!("Failed to create file root {:?}", config.files.root))?;
    let files: Arc<dyn FileService> = Arc::new(
        FsFileService::new(config.files.root.clone(), &config.database.path)
            .context("Failed to create file service")?,
    );
    info!("File storage at {:?}", config.files.root);

    // Container engine
    let engine: Arc<dyn ContainerEngine> = Arc::new(DockerCliEngine::new(config.runtime.clone()));
    match engine.validate().await {
        Ok(()) => info!("Container engine '{}' is available", engine.name()),
        Err(e) => warn!(
            "Container engine '{}' is not usable, lifecycle operations will fail: {}",
            engine.name(),
            e
        ),
    }

    // Orchestrator
    let ports = PortAllocator::new(Arc::clone(&store), config.orchestrator.port_attempts);
    let runtime = ContainerRuntime::new(engine, ports, config.runtime.clone());
    let orchestrator = Arc::new(ServerOrchestrator::new(
        config.orchestrator.clone(),
        Arc::clone(&store),
        files,
        runtime,
    ));

    let sweeper = if config.orchestrator.sweep_enabled {
        let sweeper = StatusSweeper::new(
            Arc::clone(&orchestrator),
            Duration::from_secs(config.orchestrator.sweep_interval_secs),
        );
        sweeper.start();
        Some(sweeper)
    } else {
        info!("Status sweep disabled");
        None
    };

    // Create app state and router
    let addr = SocketAddr::new(config.http.host, config.http.port);
    let state = Arc::new(AppState::new(config, orchestrator));
    let app = create_router(state);

    // Start server
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(sweeper) = sweeper {
        info!("Stopping status sweeper...");
        sweeper.stop();
    }

    info!("Server shut down");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
