//! Video rendition entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use mediahub_core::types::{StorageId, VideoFileId, VideoId};

/// One physical rendition (encoding profile output) of a video.
///
/// `storage_id` and `remote_path` are private and only change together,
/// so a file is never partially remote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct VideoFile {
    /// Identifier; `None` until the record has been persisted.
    pub id: Option<VideoFileId>,
    /// Owning video.
    pub video_id: VideoId,
    /// Local path, relative to the media root or absolute.
    pub path: String,
    /// Storage holding the remote copy.
    storage_id: Option<StorageId>,
    /// Location of the remote copy on that storage.
    remote_path: Option<String>,
    /// Size in bytes.
    pub file_size: i64,
    /// Encoding profile name (e.g. `720p`).
    pub profile: String,
    /// When the rendition was created.
    pub created_at: DateTime<Utc>,
}

impl VideoFile {
    /// Build a local-only rendition.
    pub fn new(
        id: Option<VideoFileId>,
        video_id: VideoId,
        path: impl Into<String>,
        file_size: i64,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            id,
            video_id,
            path: path.into(),
            storage_id: None,
            remote_path: None,
            file_size,
            profile: profile.into(),
            created_at: Utc::now(),
        }
    }

    /// Builder variant of [`VideoFile::assign_remote`].
    pub fn on_storage(mut self, storage_id: StorageId, remote_path: impl Into<String>) -> Self {
        self.assign_remote(storage_id, remote_path);
        self
    }

    /// Whether a remote copy exists.
    pub fn is_remote(&self) -> bool {
        self.storage_id.is_some() && self.remote_path.is_some()
    }

    /// Storage of the remote copy, if any.
    pub fn storage_id(&self) -> Option<StorageId> {
        self.storage_id
    }

    /// Remote path of the remote copy, if any.
    pub fn remote_path(&self) -> Option<&str> {
        self.remote_path.as_deref()
    }

    /// Storage and remote path together, when the file is remote.
    pub fn remote_location(&self) -> Option<(StorageId, &str)> {
        match (self.storage_id, self.remote_path.as_deref()) {
            (Some(storage_id), Some(path)) => Some((storage_id, path)),
            _ => None,
        }
    }

    /// Point the file at a remote copy after a successful upload.
    pub fn assign_remote(&mut self, storage_id: StorageId, remote_path: impl Into<String>) {
        self.storage_id = Some(storage_id);
        self.remote_path = Some(remote_path.into());
    }

    /// Forget the remote copy (the file is local-only again).
    pub fn clear_remote(&mut self) {
        self.storage_id = None;
        self.remote_path = None;
    }

    /// File extension of the local path, defaulting to `mp4`.
    pub fn extension(&self) -> &str {
        std::path::Path::new(&self.path)
            .extension()
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
            .unwrap_or("mp4")
    }

    /// Profile name normalized for use in paths.
    pub fn profile_slug(&self) -> String {
        let slug = self.profile.trim().to_lowercase();
        if slug.is_empty() {
            "default".to_string()
        } else {
            slug
        }
    }
}
