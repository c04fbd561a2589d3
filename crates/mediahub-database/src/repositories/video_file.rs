//! Video rendition repository implementation.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::{StorageId, VideoFileId, VideoId};
use mediahub_entity::video_file::{VideoFile, VideoFileStore};

const VIDEO_FILE_COLUMNS: &str =
    "id, video_id, path, storage_id, remote_path, file_size, profile, created_at";

/// PostgreSQL-backed video renditions.
#[derive(Debug, Clone)]
pub struct VideoFileRepository {
    pool: PgPool,
}

impl VideoFileRepository {
    /// Create a new video file repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn db_error(message: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |e| AppError::with_source(ErrorKind::Database, message, e)
    }
}

#[async_trait]
impl VideoFileStore for VideoFileRepository {
    async fn find_video_file_by_id(&self, id: VideoFileId) -> AppResult<Option<VideoFile>> {
        sqlx::query_as::<_, VideoFile>(&format!(
            "SELECT {VIDEO_FILE_COLUMNS} FROM video_files WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::db_error("Failed to find video file"))
    }

    async fn find_video_files_by_storage(
        &self,
        storage_id: StorageId,
    ) -> AppResult<Vec<VideoFile>> {
        sqlx::query_as::<_, VideoFile>(&format!(
            "SELECT {VIDEO_FILE_COLUMNS} FROM video_files WHERE storage_id = $1 ORDER BY id ASC"
        ))
        .bind(storage_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_error("Failed to list video files by storage"))
    }

    async fn find_video_files_without_storage(&self) -> AppResult<Vec<VideoFile>> {
        sqlx::query_as::<_, VideoFile>(&format!(
            "SELECT {VIDEO_FILE_COLUMNS} FROM video_files WHERE storage_id IS NULL ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_error("Failed to list local video files"))
    }

    async fn find_video_files_by_video(&self, video_id: VideoId) -> AppResult<Vec<VideoFile>> {
        sqlx::query_as::<_, VideoFile>(&format!(
            "SELECT {VIDEO_FILE_COLUMNS} FROM video_files WHERE video_id = $1 ORDER BY id ASC"
        ))
        .bind(video_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::db_error("Failed to list video files by video"))
    }

    async fn save_video_file(&self, file: &VideoFile) -> AppResult<()> {
        let Some(id) = file.id else {
            return Err(AppError::validation(
                "Cannot save a video file that has not been created yet",
            ));
        };

        let result = sqlx::query(
            "UPDATE video_files SET path = $2, storage_id = $3, remote_path = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(&file.path)
        .bind(file.storage_id())
        .bind(file.remote_path())
        .execute(&self.pool)
        .await
        .map_err(Self::db_error("Failed to save video file"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(format!("Video file {id} not found")));
        }

        debug!(video_file_id = %id, remote = file.is_remote(), "Saved video file location");
        Ok(())
    }
}
