//! Fan-out of remote deletions when renditions are removed.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::job::{DeleteFromStorageMessage, JobDispatcher};
use mediahub_entity::video_file::VideoFile;

/// Queues one deletion job per remote copy.
#[derive(Debug, Clone)]
pub struct DeletionService {
    dispatcher: Arc<dyn JobDispatcher>,
}

impl DeletionService {
    pub fn new(dispatcher: Arc<dyn JobDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Enqueue deletions for every file that has a remote copy.
    /// Local-only files are skipped.
    pub async fn enqueue_deletions(
        &self,
        files: &[VideoFile],
    ) -> AppResult<Vec<DeleteFromStorageMessage>> {
        let mut messages = Vec::new();
        for file in files {
            let Some((storage_id, remote_path)) = file.remote_location() else {
                debug!(file_id = ?file.id, "Local-only rendition, nothing to delete remotely");
                continue;
            };
            let message = DeleteFromStorageMessage::new(storage_id, remote_path);
            self.dispatcher.enqueue(message.clone().into()).await?;
            messages.push(message);
        }
        if !messages.is_empty() {
            info!(jobs = messages.len(), "Queued remote deletions");
        }
        Ok(messages)
    }
}

/// Number of deletion jobs per storage.
pub fn group_by_storage(messages: &[DeleteFromStorageMessage]) -> BTreeMap<StorageId, usize> {
    let mut groups = BTreeMap::new();
    for message in messages {
        *groups.entry(message.storage_id).or_insert(0) += 1;
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_by_storage() {
        let messages = vec![
            DeleteFromStorageMessage::new(StorageId::new(2), "a"),
            DeleteFromStorageMessage::new(StorageId::new(1), "b"),
            DeleteFromStorageMessage::new(StorageId::new(2), "c"),
        ];
        let groups = group_by_storage(&messages);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&StorageId::new(1)], 1);
        assert_eq!(groups[&StorageId::new(2)], 2);
    }
}
