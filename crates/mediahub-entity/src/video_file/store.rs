//! Persistence collaborator for video renditions.

use async_trait::async_trait;

use mediahub_core::result::AppResult;
use mediahub_core::types::{StorageId, VideoFileId, VideoId};

use super::model::VideoFile;

/// Read/write access to video renditions.
#[async_trait]
pub trait VideoFileStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a rendition by ID.
    async fn find_video_file_by_id(&self, id: VideoFileId) -> AppResult<Option<VideoFile>>;

    /// All renditions whose remote copy lives on `storage_id`.
    async fn find_video_files_by_storage(&self, storage_id: StorageId)
    -> AppResult<Vec<VideoFile>>;

    /// All renditions with no storage reference.
    async fn find_video_files_without_storage(&self) -> AppResult<Vec<VideoFile>>;

    /// All renditions of one video.
    async fn find_video_files_by_video(&self, video_id: VideoId) -> AppResult<Vec<VideoFile>>;

    /// Persist the storage reference, remote path, and local path of a rendition.
    async fn save_video_file(&self, file: &VideoFile) -> AppResult<()>;
}
