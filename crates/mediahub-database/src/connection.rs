//! PostgreSQL connection pool and schema migrations.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use mediahub_core::config::DatabaseConfig;
use mediahub_core::error::{AppError, ErrorKind};

use crate::repositories::{StorageRepository, VideoFileRepository};

/// Wrapper around the sqlx PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    /// Connect using the configured URL and pool limits.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        info!(
            url = %mask_password(&config.url),
            max_connections = config.max_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .idle_timeout(Duration::from_secs(config.idle_timeout_seconds))
            .connect(&config.url)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to connect to database: {e}"),
                    e,
                )
            })?;

        Ok(Self { pool })
    }

    /// Apply the `storages` / `video_files` schema migrations.
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Database,
                    format!("Failed to run migrations: {e}"),
                    e,
                )
            })?;

        info!("Database schema is up to date");
        Ok(())
    }

    /// Repository for storage records.
    pub fn storage_repository(&self) -> StorageRepository {
        StorageRepository::new(self.pool.clone())
    }

    /// Repository for video renditions.
    pub fn video_file_repository(&self) -> VideoFileRepository {
        VideoFileRepository::new(self.pool.clone())
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}

/// Mask the password portion of a database URL for safe logging.
fn mask_password(url: &str) -> String {
    let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
    match url.find('@') {
        Some(at) => match url[..at].rfind(':') {
            Some(colon) if colon > scheme_end => {
                format!("{}:****@{}", &url[..colon], &url[at + 1..])
            }
            _ => url.to_string(),
        },
        None => url.to_string(),
    }
}
