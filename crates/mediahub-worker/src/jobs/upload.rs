//! Pushes a freshly encoded rendition to the default storage.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{error, info, warn};

use mediahub_entity::job::{JobDispatcher, JobMessage, MAX_ATTEMPTS, UploadToStorageMessage};
use mediahub_entity::video_file::VideoFileStore;
use mediahub_service::storage::remote_path_for;
use mediahub_storage::StorageManager;

use super::{schedule_retry, unexpected_payload};
use crate::executor::{JobExecutionError, JobHandler};

/// Handles `upload_to_storage` jobs.
#[derive(Debug)]
pub struct UploadToStorageJobHandler {
    files: Arc<dyn VideoFileStore>,
    manager: Arc<StorageManager>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl UploadToStorageJobHandler {
    pub fn new(
        files: Arc<dyn VideoFileStore>,
        manager: Arc<StorageManager>,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            files,
            manager,
            dispatcher,
        }
    }

    fn resolve_local(&self, path: &str) -> PathBuf {
        let path = PathBuf::from(path);
        if path.is_absolute() {
            path
        } else {
            self.manager.media_root().join(path)
        }
    }

    async fn handle(
        &self,
        message: &UploadToStorageMessage,
    ) -> Result<Option<Value>, JobExecutionError> {
        let Some(mut file) = self.files.find_video_file_by_id(message.video_file_id).await? else {
            warn!(file_id = %message.video_file_id, "Video file not found for upload");
            return Ok(None);
        };

        let local = self.resolve_local(&message.local_path);
        if !tokio::fs::try_exists(&local).await.unwrap_or(false) {
            error!(
                file_id = %message.video_file_id,
                local_path = %local.display(),
                "Local file missing, dropping upload"
            );
            return Ok(None);
        }

        let Some(storage) = self.manager.default_storage().await? else {
            info!(file_id = %message.video_file_id, "No default storage configured, keeping file local");
            return Ok(None);
        };

        let remote_path = remote_path_for(&file);
        let failure = match self
            .manager
            .upload_file(&local, &remote_path, Some(&storage))
            .await
        {
            Ok(result) if result.is_success() => {
                let stored = result.remote_path().unwrap_or(remote_path.as_str()).to_string();
                file.assign_remote(storage.id, stored.clone());
                self.files.save_video_file(&file).await?;
                info!(
                    file_id = %message.video_file_id,
                    storage = %storage.name,
                    remote_path = %stored,
                    "Uploaded rendition to storage"
                );
                return Ok(Some(json!({ "storage_id": storage.id, "remote_path": stored })));
            }
            Ok(result) => result
                .error_message()
                .unwrap_or("upload failed")
                .to_string(),
            Err(e) => e.to_string(),
        };

        if message.attempt < MAX_ATTEMPTS {
            return Err(schedule_retry(
                self.dispatcher.as_ref(),
                message.retry().into(),
                format!("Upload of file {} failed: {failure}", message.video_file_id),
            )
            .await);
        }
        Err(JobExecutionError::Permanent(format!(
            "Upload of file {} to storage \"{}\" failed after {MAX_ATTEMPTS} attempts: {failure}",
            message.video_file_id, storage.name
        )))
    }
}

#[async_trait]
impl JobHandler for UploadToStorageJobHandler {
    fn job_type(&self) -> &str {
        "upload_to_storage"
    }

    async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
        match job {
            JobMessage::UploadToStorage(message) => self.handle(message).await,
            other => Err(unexpected_payload("upload_to_storage", other)),
        }
    }
}
