//! Moves one rendition to another storage.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use mediahub_entity::job::{JobDispatcher, JobMessage, MAX_ATTEMPTS, MigrateFileMessage};
use mediahub_entity::storage::Storage;
use mediahub_entity::video_file::VideoFileStore;
use mediahub_service::storage::{LOCAL_STORAGE_NAME, MigrationService};
use mediahub_storage::StorageManager;

use super::{schedule_retry, unexpected_payload};
use crate::executor::{JobExecutionError, JobHandler};

/// Handles `migrate_file` jobs.
#[derive(Debug)]
pub struct MigrateFileJobHandler {
    files: Arc<dyn VideoFileStore>,
    manager: Arc<StorageManager>,
    migrations: MigrationService,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl MigrateFileJobHandler {
    pub fn new(
        files: Arc<dyn VideoFileStore>,
        manager: Arc<StorageManager>,
        migrations: MigrationService,
        dispatcher: Arc<dyn JobDispatcher>,
    ) -> Self {
        Self {
            files,
            manager,
            migrations,
            dispatcher,
        }
    }

    async fn record_failure(
        &self,
        message: &MigrateFileMessage,
        error: &str,
    ) -> Result<(), JobExecutionError> {
        if let Some(id) = &message.migration_id {
            self.migrations
                .reports()
                .record_failure(id, message.video_file_id, error)
                .await?;
        }
        Ok(())
    }

    /// Destination storage, or the reason the job cannot run.
    async fn destination(
        &self,
        message: &MigrateFileMessage,
    ) -> Result<Result<Option<Storage>, String>, JobExecutionError> {
        let Some(id) = message.destination_storage_id else {
            return Ok(Ok(None));
        };
        Ok(match self.manager.find_storage(id).await? {
            None => Err(format!("Destination storage {id} not found")),
            Some(storage) if !storage.is_enabled => Err(format!(
                "Destination storage \"{}\" is disabled",
                storage.name
            )),
            Some(storage) => Ok(Some(storage)),
        })
    }

    async fn handle(&self, message: &MigrateFileMessage) -> Result<Option<Value>, JobExecutionError> {
        let Some(mut file) = self.files.find_video_file_by_id(message.video_file_id).await? else {
            warn!(file_id = %message.video_file_id, "Video file not found for migration");
            self.record_failure(
                message,
                &format!("Video file {} not found", message.video_file_id),
            )
            .await?;
            return Ok(None);
        };

        let destination = match self.destination(message).await? {
            Ok(destination) => destination,
            Err(reason) => {
                warn!(file_id = %message.video_file_id, reason = %reason, "Dropping migration job");
                self.record_failure(message, &reason).await?;
                return Ok(None);
            }
        };
        let destination_name = destination
            .as_ref()
            .map_or(LOCAL_STORAGE_NAME, |s| s.name.as_str())
            .to_string();

        info!(
            file_id = %message.video_file_id,
            source_storage_id = ?file.storage_id(),
            destination = %destination_name,
            attempt = message.attempt,
            "Starting file migration"
        );

        let outcome = match self.migrations.migrate_file(&mut file, destination.as_ref()).await {
            Ok(()) => self.files.save_video_file(&file).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                if let Some(id) = &message.migration_id {
                    self.migrations
                        .reports()
                        .record_success(id, message.video_file_id)
                        .await?;
                }
                info!(
                    file_id = %message.video_file_id,
                    destination = %destination_name,
                    remote_path = ?file.remote_path(),
                    "File migrated"
                );
                Ok(Some(json!({
                    "video_file_id": message.video_file_id,
                    "storage_id": file.storage_id(),
                    "remote_path": file.remote_path(),
                })))
            }
            Err(e) if message.attempt < MAX_ATTEMPTS => Err(schedule_retry(
                self.dispatcher.as_ref(),
                message.retry().into(),
                format!("Migration of file {} failed: {e}", message.video_file_id),
            )
            .await),
            Err(e) => {
                let error = e.to_string();
                self.record_failure(message, &error).await?;
                Err(JobExecutionError::Permanent(format!(
                    "All {MAX_ATTEMPTS} migration attempts for file {} to {destination_name} failed: {error}",
                    message.video_file_id
                )))
            }
        }
    }
}

#[async_trait]
impl JobHandler for MigrateFileJobHandler {
    fn job_type(&self) -> &str {
        "migrate_file"
    }

    async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
        match job {
            JobMessage::MigrateFile(message) => self.handle(message).await,
            other => Err(unexpected_payload("migrate_file", other)),
        }
    }
}
