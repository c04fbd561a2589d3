//! The storage adapter contract shared by every backend.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use mediahub_entity::storage::{ConnectionTestResult, StorageQuota, StorageType, UploadResult};

/// Uniform operations over one configured storage backend.
///
/// Transfer methods report failure through their return value
/// (`UploadResult::failure`, `false`) after the retry budget is spent;
/// they never return configuration errors, which are raised when the
/// adapter is built.
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug + 'static {
    /// Backend kind.
    fn storage_type(&self) -> StorageType;

    /// Copy a local file to `remote_path`, creating directories as needed.
    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadResult;

    /// Copy `remote_path` to a local file, creating local parent directories.
    async fn download(&self, remote_path: &str, local_path: &Path) -> bool;

    /// Remove `remote_path`. A missing file counts as deleted.
    async fn delete(&self, remote_path: &str) -> bool;

    /// Whether `remote_path` exists.
    async fn exists(&self, remote_path: &str) -> bool;

    /// Public or proxy URL of `remote_path`.
    fn url(&self, remote_path: &str) -> String;

    /// Time-limited URL of `remote_path`. Backends without signing return [`Self::url`].
    fn signed_url(&self, remote_path: &str, expires_in: Duration) -> String;

    /// Check that the backend is reachable.
    async fn test_connection(&self) -> ConnectionTestResult;

    /// Used/total capacity, when the backend can report it.
    async fn quota(&self) -> Option<StorageQuota>;

    /// Ensure a directory exists. Idempotent.
    async fn create_directory(&self, path: &str) -> bool;
}

/// Join a relative remote path onto a base path with exactly one `/` between them.
pub fn join_remote(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if base.is_empty() {
        path.to_string()
    } else if path.is_empty() {
        base.to_string()
    } else {
        format!("{base}/{path}")
    }
}

/// Parent directory of a remote path; `None` for top-level entries.
pub fn remote_parent(path: &str) -> Option<&str> {
    let trimmed = path.trim_end_matches('/');
    let (parent, _) = trimmed.rsplit_once('/')?;
    let parent = parent.trim_end_matches('/');
    if parent.is_empty() || parent == "." {
        None
    } else {
        Some(parent)
    }
}

/// Milliseconds elapsed since `started`, saturating.
pub(crate) fn elapsed_ms(started: std::time::Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_remote_normalizes_slashes() {
        assert_eq!(join_remote("/srv/media/", "/videos/a.mp4"), "/srv/media/videos/a.mp4");
        assert_eq!(join_remote("", "videos/a.mp4"), "videos/a.mp4");
        assert_eq!(join_remote("/srv", ""), "/srv");
    }

    #[test]
    fn test_remote_parent() {
        assert_eq!(remote_parent("videos/1/720p/a.mp4"), Some("videos/1/720p"));
        assert_eq!(remote_parent("a.mp4"), None);
        assert_eq!(remote_parent("./a.mp4"), None);
    }
}
