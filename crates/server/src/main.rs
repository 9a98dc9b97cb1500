mod api;
mod driver;
mod state;
mod worker;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester_core::{
    load_config, spawn_monitor_loop, validate_config, AlertSink, CheckpointStore, JobOrchestrator,
    SqliteCheckpointStore, StatusPublisher, SystemAdmission, WebhookAlertSink,
};

use api::create_router;
use state::{AppState, JobRegistry, RegistryPublisher};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Jobs accepted but not yet picked up by a worker.
const JOB_QUEUE_CAPACITY: usize = 64;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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

    info!("harvester {} starting", VERSION);

    // Determine config path
    let config_path = std::env::var("HARVESTER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Download directory: {:?}", config.paths.download_dir);
    info!("Artifact directory: {:?}", config.paths.xml_dir);
    info!("Database path: {:?}", config.paths.database);

    std::fs::create_dir_all(&config.paths.download_dir)
        .context("Failed to create download directory")?;
    std::fs::create_dir_all(&config.paths.xml_dir)
        .context("Failed to create artifact directory")?;

    // Checkpoint store
    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(
        SqliteCheckpointStore::new(&config.paths.database)
            .context("Failed to open checkpoint store")?,
    );
    info!("Checkpoint store initialized");

    // Portal driver backend
    let portal_driver = driver::create_driver(&config.portal);
    info!("Portal driver: {}", portal_driver.name());

    // Admission controller and advisory monitor loop
    let admission = Arc::new(SystemAdmission::new(config.admission.clone()));
    let (shutdown_tx, _) = broadcast::channel(1);
    let monitor_handle = spawn_monitor_loop(config.admission.clone(), shutdown_tx.subscribe());

    // Status registry doubles as the publisher sink
    let registry = Arc::new(JobRegistry::new());
    let publisher: Arc<dyn StatusPublisher> =
        Arc::new(RegistryPublisher::new(Arc::clone(&registry)));

    // Optional webhook alerts
    let alerts: Option<Arc<dyn AlertSink>> = match &config.alert {
        Some(alert_config) => {
            info!("Webhook alerts enabled");
            let sink = WebhookAlertSink::new(alert_config)
                .context("Failed to build alert webhook client")?;
            Some(Arc::new(sink))
        }
        None => {
            info!("Webhook alerts not configured");
            None
        }
    };

    // Orchestrator and worker pool
    let orchestrator = Arc::new(JobOrchestrator::new(
        config.clone(),
        portal_driver,
        admission,
        checkpoints,
        publisher,
        alerts,
    ));

    let (jobs_tx, jobs_rx) = mpsc::channel(JOB_QUEUE_CAPACITY);
    let worker_handles = worker::spawn_workers(
        config.orchestrator.workers,
        jobs_rx,
        Arc::clone(&orchestrator),
        &shutdown_tx,
    );
    info!("{} job workers started", config.orchestrator.workers);

    // Create app state and router
    let state = Arc::new(AppState::new(config.clone(), jobs_tx, registry));
    let app = create_router(Arc::clone(&state));

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    // Stop accepting work, drain in-flight jobs at the next safe boundary
    orchestrator.request_shutdown();
    let _ = shutdown_tx.send(());
    drop(state);

    futures::future::join_all(worker_handles).await;
    let _ = monitor_handle.await;
    info!("Shutdown complete");

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
