//! MediaHub Server: storage core for video renditions.
//!
//! Main entry point that wires all crates together and starts the server.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, fmt};

use mediahub_api::{AppState, build_router};
use mediahub_cache::CacheManager;
use mediahub_core::config::AppConfig;
use mediahub_core::error::AppError;
use mediahub_core::traits::cache::CacheProvider;
use mediahub_database::{DatabasePool, InMemoryCatalog};
use mediahub_entity::job::JobDispatcher;
use mediahub_entity::storage::StorageStore;
use mediahub_entity::video_file::VideoFileStore;
use mediahub_service::storage::{
    MigrationReportService, MigrationService, StorageStatsService, format_size,
    storages_with_warning,
};
use mediahub_storage::{AdapterRegistry, RetryExecutor, SignedUrlService, StorageManager};
use mediahub_worker::executor::JobExecutor;
use mediahub_worker::jobs::{
    DeleteFromStorageJobHandler, MigrateFileJobHandler, UploadToStorageJobHandler,
};
use mediahub_worker::queue::JobQueue;
use mediahub_worker::runner::WorkerRunner;

#[tokio::main]
async fn main() {
    let env = std::env::var("MEDIAHUB_ENV").unwrap_or_else(|_| "development".to_string());

    let config = match AppConfig::load(&env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);
    tracing::info!(env = %env, "Configuration loaded");

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Persistence collaborators selected from configuration.
struct Catalog {
    storages: Arc<dyn StorageStore>,
    files: Arc<dyn VideoFileStore>,
    pool: Option<DatabasePool>,
}

async fn open_catalog(config: &AppConfig) -> Result<Catalog, AppError> {
    if !config.database.is_configured() {
        tracing::warn!("No database URL configured, using the in-memory catalog");
        let catalog = Arc::new(InMemoryCatalog::new());
        return Ok(Catalog {
            storages: catalog.clone(),
            files: catalog,
            pool: None,
        });
    }

    let pool = DatabasePool::connect(&config.database).await?;
    tracing::info!("Running database migrations...");
    pool.run_migrations().await?;

    Ok(Catalog {
        storages: Arc::new(pool.storage_repository()),
        files: Arc::new(pool.video_file_repository()),
        pool: Some(pool),
    })
}

/// Main server run function
async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting MediaHub v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: Create data directories ──────────────────────────
    for dir in [
        std::path::PathBuf::from(&config.storage.media_root),
        config.storage.temp_dir(),
    ] {
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::internal(format!("Failed to create dir '{}': {}", dir.display(), e))
        })?;
    }

    // ── Step 2: Persistence ──────────────────────────────────────
    let catalog = open_catalog(&config).await?;

    // ── Step 3: Initialize cache ─────────────────────────────────
    tracing::info!(provider = %config.cache.provider, "Initializing cache...");
    let cache = CacheManager::new(&config.cache).await?;
    if !cache.health_check().await? {
        return Err(AppError::cache("Cache backend did not answer the health check"));
    }

    // ── Step 4: Initialize storage layer ─────────────────────────
    if config.signing.secret.trim().is_empty() {
        return Err(AppError::configuration(
            "signing.secret must be set (MEDIAHUB__SIGNING__SECRET)",
        ));
    }
    let signing = Arc::new(SignedUrlService::new(config.signing.secret.as_bytes()));
    let registry = AdapterRegistry::with_defaults(
        &config.storage.media_root,
        signing.clone(),
        RetryExecutor::default(),
    );
    let storage_manager = Arc::new(StorageManager::new(
        catalog.storages.clone(),
        registry,
        signing,
        &config.storage,
    ));

    // ── Step 5: Job queue and services ───────────────────────────
    let (job_queue, job_receiver) = JobQueue::new(config.worker.queue_capacity);
    let dispatcher: Arc<dyn JobDispatcher> = Arc::new(job_queue.clone());

    let reports = MigrationReportService::new(cache);
    let migrations = MigrationService::new(
        storage_manager.clone(),
        catalog.files.clone(),
        dispatcher.clone(),
        reports,
    );
    let stats = StorageStatsService::new(
        storage_manager.clone(),
        catalog.storages.clone(),
        catalog.files.clone(),
    );
    log_storage_summary(&stats).await;

    // ── Step 6: Shutdown channel & worker ────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let worker_handle = if config.worker.enabled {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(MigrateFileJobHandler::new(
            catalog.files.clone(),
            storage_manager.clone(),
            migrations,
            dispatcher.clone(),
        )));
        executor.register(Arc::new(DeleteFromStorageJobHandler::new(
            storage_manager.clone(),
            dispatcher.clone(),
        )));
        executor.register(Arc::new(UploadToStorageJobHandler::new(
            catalog.files.clone(),
            storage_manager.clone(),
            dispatcher.clone(),
        )));

        let runner = WorkerRunner::new(Arc::new(executor), config.worker.clone());
        let cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            runner.run(job_receiver, cancel).await;
        }))
    } else {
        tracing::warn!("Background worker disabled; queued jobs will not be processed");
        drop(job_receiver);
        None
    };

    // ── Step 7: Build and start HTTP server ──────────────────────
    let app = build_router(AppState::new(storage_manager));
    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {}: {}", addr, e)))?;

    tracing::info!("MediaHub server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = shutdown_tx.send(true);
        })
        .await
        .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

    // ── Step 8: Drain worker and close resources ─────────────────
    if let Some(handle) = worker_handle {
        let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
        if tokio::time::timeout(grace, handle).await.is_err() {
            tracing::warn!("Worker did not stop within {:?}", grace);
        }
    }
    drop(dispatcher);
    drop(job_queue);

    if let Some(pool) = catalog.pool {
        pool.close().await;
    }

    tracing::info!("MediaHub server stopped");
    Ok(())
}

/// Log per-storage usage and quota warnings at startup.
async fn log_storage_summary(stats: &StorageStatsService) {
    let entries = match stats.all_storages_stats().await {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "Could not collect storage statistics");
            return;
        }
    };

    for entry in &entries {
        tracing::info!(
            storage = %entry.name,
            storage_type = %entry.storage_type,
            files = entry.stats.files_count,
            size = %format_size(entry.stats.total_size),
            "Storage usage"
        );
    }
    for warning in storages_with_warning(&entries) {
        tracing::warn!(
            storage = %warning.name,
            usage_percent = warning.usage_percent,
            "Storage usage above warning threshold"
        );
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
