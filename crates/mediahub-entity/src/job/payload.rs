//! Typed job message definitions.

use serde::{Deserialize, Serialize};

use mediahub_core::types::{StorageId, VideoFileId};

/// Job-level attempt ceiling. Distinct from the per-call retries of the
/// storage retry executor.
pub const MAX_ATTEMPTS: u32 = 3;

/// Move one rendition to another storage (`None` = local disk).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrateFileMessage {
    /// Rendition to move.
    pub video_file_id: VideoFileId,
    /// Destination storage; `None` moves the file back to local disk.
    pub destination_storage_id: Option<StorageId>,
    /// Report to update with the outcome.
    pub migration_id: Option<String>,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl MigrateFileMessage {
    /// First attempt of a migration job.
    pub fn new(
        video_file_id: VideoFileId,
        destination_storage_id: Option<StorageId>,
        migration_id: Option<String>,
    ) -> Self {
        Self {
            video_file_id,
            destination_storage_id,
            migration_id,
            attempt: 1,
        }
    }

    /// Copy of this message for the next attempt.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Remove one remote copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteFromStorageMessage {
    /// Storage holding the copy.
    pub storage_id: StorageId,
    /// Path of the copy on that storage.
    pub remote_path: String,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl DeleteFromStorageMessage {
    /// First attempt of a deletion job.
    pub fn new(storage_id: StorageId, remote_path: impl Into<String>) -> Self {
        Self {
            storage_id,
            remote_path: remote_path.into(),
            attempt: 1,
        }
    }

    /// Copy of this message for the next attempt.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Push a freshly encoded rendition to the default storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadToStorageMessage {
    /// Rendition to upload.
    pub video_file_id: VideoFileId,
    /// Local path of the encoded file.
    pub local_path: String,
    /// 1-based attempt counter.
    pub attempt: u32,
}

impl UploadToStorageMessage {
    /// First attempt of an upload job.
    pub fn new(video_file_id: VideoFileId, local_path: impl Into<String>) -> Self {
        Self {
            video_file_id,
            local_path: local_path.into(),
            attempt: 1,
        }
    }

    /// Copy of this message for the next attempt.
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Every job the storage core dispatches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum JobMessage {
    /// Move a rendition between storages.
    #[serde(rename = "migrate_file")]
    MigrateFile(MigrateFileMessage),
    /// Delete a remote copy.
    #[serde(rename = "delete_from_storage")]
    DeleteFromStorage(DeleteFromStorageMessage),
    /// Upload a rendition to the default storage.
    #[serde(rename = "upload_to_storage")]
    UploadToStorage(UploadToStorageMessage),
}

impl JobMessage {
    /// Job type name used to route the message to its handler.
    pub fn job_type(&self) -> &'static str {
        match self {
            Self::MigrateFile(_) => "migrate_file",
            Self::DeleteFromStorage(_) => "delete_from_storage",
            Self::UploadToStorage(_) => "upload_to_storage",
        }
    }

    /// Attempt counter of the wrapped message.
    pub fn attempt(&self) -> u32 {
        match self {
            Self::MigrateFile(m) => m.attempt,
            Self::DeleteFromStorage(m) => m.attempt,
            Self::UploadToStorage(m) => m.attempt,
        }
    }
}

impl From<MigrateFileMessage> for JobMessage {
    fn from(message: MigrateFileMessage) -> Self {
        Self::MigrateFile(message)
    }
}

impl From<DeleteFromStorageMessage> for JobMessage {
    fn from(message: DeleteFromStorageMessage) -> Self {
        Self::DeleteFromStorage(message)
    }
}

impl From<UploadToStorageMessage> for JobMessage {
    fn from(message: UploadToStorageMessage) -> Self {
        Self::UploadToStorage(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_messages_start_at_first_attempt() {
        let m = MigrateFileMessage::new(VideoFileId::new(3), Some(StorageId::new(2)), None);
        assert_eq!(m.attempt, 1);
        assert_eq!(DeleteFromStorageMessage::new(StorageId::new(5), "a").attempt, 1);
        assert_eq!(UploadToStorageMessage::new(VideoFileId::new(1), "a").attempt, 1);
    }

    #[test]
    fn test_retry_increments_attempt_and_keeps_payload() {
        let m = DeleteFromStorageMessage::new(StorageId::new(5), "videos/1/a.mp4");
        let retried = m.retry().retry();
        assert_eq!(retried.attempt, 3);
        assert_eq!(retried.storage_id, m.storage_id);
        assert_eq!(retried.remote_path, m.remote_path);
    }

    #[test]
    fn test_job_message_is_tagged_by_type() {
        let message: JobMessage =
            MigrateFileMessage::new(VideoFileId::new(9), None, Some("migration_x".into())).into();
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["job_type"], "migrate_file");
        assert_eq!(json["video_file_id"], 9);
        assert!(json["destination_storage_id"].is_null());

        let back: JobMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
        assert_eq!(back.job_type(), "migrate_file");
    }
}
