//! In-memory catalog of storages and video renditions.
//!
//! Used when no database URL is configured and throughout the test suites.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::types::{StorageId, VideoFileId, VideoId};
use mediahub_entity::storage::{Storage, StorageStore};
use mediahub_entity::video_file::{VideoFile, VideoFileStore};

/// Thread-safe in-memory implementation of both persistence collaborators.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    storages: DashMap<StorageId, Storage>,
    files: DashMap<VideoFileId, VideoFile>,
    next_file_id: AtomicI64,
}

impl InMemoryCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a storage record.
    pub fn insert_storage(&self, storage: Storage) {
        self.storages.insert(storage.id, storage);
    }

    /// Insert a rendition, assigning an id when it has none. Returns the stored copy.
    pub fn insert_video_file(&self, mut file: VideoFile) -> VideoFile {
        let id = match file.id {
            Some(id) => {
                self.next_file_id.fetch_max(id.get(), Ordering::SeqCst);
                id
            }
            None => VideoFileId::new(self.next_file_id.fetch_add(1, Ordering::SeqCst) + 1),
        };
        file.id = Some(id);
        self.files.insert(id, file.clone());
        file
    }

    /// Snapshot of one rendition.
    pub fn video_file(&self, id: VideoFileId) -> Option<VideoFile> {
        self.files.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of all renditions, ordered by id.
    pub fn video_files(&self) -> Vec<VideoFile> {
        self.sorted_files(|_| true)
    }

    fn sorted_files(&self, predicate: impl Fn(&VideoFile) -> bool) -> Vec<VideoFile> {
        let mut files: Vec<VideoFile> = self
            .files
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        files.sort_by_key(|f| f.id);
        files
    }
}

#[async_trait]
impl StorageStore for InMemoryCatalog {
    async fn find_storage_by_id(&self, id: StorageId) -> AppResult<Option<Storage>> {
        Ok(self.storages.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_default_storage(&self) -> AppResult<Option<Storage>> {
        Ok(self
            .storages
            .iter()
            .filter(|entry| entry.value().is_default)
            .min_by_key(|entry| *entry.key())
            .map(|entry| entry.value().clone()))
    }

    async fn find_all_storages(&self) -> AppResult<Vec<Storage>> {
        let mut storages: Vec<Storage> = self
            .storages
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        storages.sort_by_key(|s| s.id);
        Ok(storages)
    }
}

#[async_trait]
impl VideoFileStore for InMemoryCatalog {
    async fn find_video_file_by_id(&self, id: VideoFileId) -> AppResult<Option<VideoFile>> {
        Ok(self.video_file(id))
    }

    async fn find_video_files_by_storage(
        &self,
        storage_id: StorageId,
    ) -> AppResult<Vec<VideoFile>> {
        Ok(self.sorted_files(|f| f.storage_id() == Some(storage_id)))
    }

    async fn find_video_files_without_storage(&self) -> AppResult<Vec<VideoFile>> {
        Ok(self.sorted_files(|f| f.storage_id().is_none()))
    }

    async fn find_video_files_by_video(&self, video_id: VideoId) -> AppResult<Vec<VideoFile>> {
        Ok(self.sorted_files(|f| f.video_id == video_id))
    }

    async fn save_video_file(&self, file: &VideoFile) -> AppResult<()> {
        let id = file.id.ok_or_else(|| {
            AppError::validation("Cannot save a video file that has not been created yet")
        })?;
        match self.files.get_mut(&id) {
            Some(mut entry) => {
                *entry = file.clone();
                Ok(())
            }
            None => Err(AppError::not_found(format!("Video file {id} not found"))),
        }
    }
}
