//! Removes one remote copy.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use mediahub_entity::job::{DeleteFromStorageMessage, JobDispatcher, JobMessage, MAX_ATTEMPTS};
use mediahub_storage::StorageManager;

use super::{schedule_retry, unexpected_payload};
use crate::executor::{JobExecutionError, JobHandler};

/// Handles `delete_from_storage` jobs.
#[derive(Debug)]
pub struct DeleteFromStorageJobHandler {
    manager: Arc<StorageManager>,
    dispatcher: Arc<dyn JobDispatcher>,
}

impl DeleteFromStorageJobHandler {
    pub fn new(manager: Arc<StorageManager>, dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self {
            manager,
            dispatcher,
        }
    }

    async fn handle(
        &self,
        message: &DeleteFromStorageMessage,
    ) -> Result<Option<Value>, JobExecutionError> {
        let Some(storage) = self.manager.find_storage(message.storage_id).await? else {
            warn!(
                storage_id = %message.storage_id,
                remote_path = %message.remote_path,
                "Storage not found, dropping deletion"
            );
            return Ok(None);
        };

        let failure = match self.manager.delete_file(&message.remote_path, &storage).await {
            Ok(true) => {
                info!(storage = %storage.name, remote_path = %message.remote_path, "Deleted remote file");
                return Ok(Some(json!({ "deleted": message.remote_path })));
            }
            Ok(false) => "adapter reported failure".to_string(),
            Err(e) => e.to_string(),
        };

        if message.attempt < MAX_ATTEMPTS {
            return Err(schedule_retry(
                self.dispatcher.as_ref(),
                message.retry().into(),
                format!(
                    "Deleting \"{}\" from storage \"{}\" failed: {failure}",
                    message.remote_path, storage.name
                ),
            )
            .await);
        }
        Err(JobExecutionError::Permanent(format!(
            "Deleting \"{}\" from storage \"{}\" failed after {MAX_ATTEMPTS} attempts, manual cleanup required: {failure}",
            message.remote_path, storage.name
        )))
    }
}

#[async_trait]
impl JobHandler for DeleteFromStorageJobHandler {
    fn job_type(&self) -> &str {
        "delete_from_storage"
    }

    async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
        match job {
            JobMessage::DeleteFromStorage(message) => self.handle(message).await,
            other => Err(unexpected_payload("delete_from_storage", other)),
        }
    }
}
