//! Storage repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::storage::{Storage, StorageStore};

const STORAGE_COLUMNS: &str =
    "id, name, storage_type, config, is_default, is_enabled, created_at, updated_at";

/// PostgreSQL-backed storage records.
#[derive(Debug, Clone)]
pub struct StorageRepository {
    pool: PgPool,
}

impl StorageRepository {
    /// Create a new storage repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StorageStore for StorageRepository {
    async fn find_storage_by_id(&self, id: StorageId) -> AppResult<Option<Storage>> {
        sqlx::query_as::<_, Storage>(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find storage", e))
    }

    async fn find_default_storage(&self) -> AppResult<Option<Storage>> {
        sqlx::query_as::<_, Storage>(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages WHERE is_default = TRUE ORDER BY id ASC LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find default storage", e)
        })
    }

    async fn find_all_storages(&self) -> AppResult<Vec<Storage>> {
        sqlx::query_as::<_, Storage>(&format!(
            "SELECT {STORAGE_COLUMNS} FROM storages ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list storages", e))
    }
}
