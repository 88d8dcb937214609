use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webpit_core::{
    load_config, load_config_from_env, validate_config, CommandToolkit, ConversionOrchestrator,
    ConversionStore, JsonFileStore, MediaToolkit,
};
use webpit_server::{api::create_router, state::AppState};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

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

    info!(version = VERSION, "Starting webpit");

    // Determine config path
    let config_path = std::env::var("WEBPIT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration; without a file, defaults plus environment
    let config = if config_path.exists() {
        info!("Loading configuration from {:?}", config_path);
        load_config(&config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path))?
    } else {
        info!(
            "No config file at {:?}, using defaults and environment",
            config_path
        );
        load_config_from_env().context("Failed to load config from environment")?
    };

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Storage root: {:?}", config.storage.root);

    // External tools
    let toolkit = CommandToolkit::new(config.tools.clone());
    if let Err(e) = toolkit.validate().await {
        warn!(error = %e, "Conversion tools unavailable, conversions will fail");
    }
    let toolkit: Arc<dyn MediaToolkit> = Arc::new(toolkit);

    // Document store
    let store: Arc<dyn ConversionStore> = Arc::new(JsonFileStore::new(config.storage.data_dir()));
    info!("Document store at {:?}", config.storage.data_dir());

    // Orchestrator
    let orchestrator = ConversionOrchestrator::new(
        config.orchestrator.clone(),
        config.storage.files_dir(),
        store,
        toolkit,
    );
    orchestrator.start().await;
    info!("Conversion orchestrator started");

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), orchestrator.clone()));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Server shutting down...");
    orchestrator.stop().await;
    info!("Orchestrator stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
