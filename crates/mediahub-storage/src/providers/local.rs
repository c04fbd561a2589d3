//! Local filesystem storage adapter.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sysinfo::Disks;
use tokio::fs;
use tracing::{debug, warn};

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_entity::storage::{
    ConnectionTestResult, Storage, StorageQuota, StorageType, UploadResult,
};

use crate::adapter::{StorageAdapter, elapsed_ms};
use crate::retry::RetryExecutor;

/// Local filesystem adapter rooted at `basePath`.
#[derive(Debug, Clone)]
pub struct LocalStorageAdapter {
    /// Root directory for all stored files.
    root: PathBuf,
    /// Public URL prefix, when files are served by a web server.
    public_url: Option<String>,
    retry: RetryExecutor,
}

impl LocalStorageAdapter {
    /// Create an adapter rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, public_url: Option<String>, retry: RetryExecutor) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.filter(|u| !u.trim().is_empty()),
            retry,
        }
    }

    /// Build from a storage record; `basePath` defaults to `default_root`.
    pub fn from_storage(storage: &Storage, default_root: &Path, retry: RetryExecutor) -> Self {
        let root = storage
            .config_str_non_blank("basePath")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_root.to_path_buf());
        Self::new(root, storage.config_str_non_blank("publicUrl"), retry)
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path to an absolute path within the root.
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }

    async fn copy_file(from: &Path, to: &Path) -> AppResult<()> {
        ensure_parent(to).await?;
        fs::copy(from, to).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to copy {} -> {}", from.display(), to.display()),
                e,
            )
        })?;
        Ok(())
    }

    fn disk_quota(root: &Path) -> Option<StorageQuota> {
        let target = root.canonicalize().ok()?;
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())?;
        let total = i64::try_from(disk.total_space()).ok()?;
        let available = i64::try_from(disk.available_space()).ok()?;
        Some(StorageQuota::new(total.saturating_sub(available), Some(total)))
    }
}

/// Ensure the parent directory of a path exists.
pub(crate) async fn ensure_parent(path: &Path) -> AppResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create parent directory: {}", parent.display()),
                e,
            )
        })?;
    }
    Ok(())
}

#[async_trait]
impl StorageAdapter for LocalStorageAdapter {
    fn storage_type(&self) -> StorageType {
        StorageType::Local
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadResult {
        if !local_path.is_file() {
            return UploadResult::failure(format!(
                "Local file does not exist: {}",
                local_path.display()
            ));
        }
        let target = self.resolve(remote_path);
        let result = self
            .retry
            .execute("upload", || Self::copy_file(local_path, &target))
            .await;
        match result {
            Ok(()) => {
                debug!(remote_path, "Stored file on local storage");
                UploadResult::success(remote_path)
            }
            Err(e) => UploadResult::failure(e.to_string()),
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> bool {
        let source = self.resolve(remote_path);
        if !source.is_file() {
            debug!(remote_path, "Local storage file not found");
            return false;
        }
        self.retry
            .execute("download", || Self::copy_file(&source, local_path))
            .await
            .map_err(|e| warn!(remote_path, error = %e, "Local download failed"))
            .is_ok()
    }

    async fn delete(&self, remote_path: &str) -> bool {
        let target = self.resolve(remote_path);
        let result = self
            .retry
            .execute("delete", || async {
                match fs::remove_file(&target).await {
                    Ok(()) => Ok(()),
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                    Err(e) => Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!("Failed to delete file: {remote_path}"),
                        e,
                    )),
                }
            })
            .await;
        result
            .map_err(|e| warn!(remote_path, error = %e, "Local delete failed"))
            .is_ok()
    }

    async fn exists(&self, remote_path: &str) -> bool {
        fs::try_exists(self.resolve(remote_path))
            .await
            .unwrap_or(false)
    }

    fn url(&self, remote_path: &str) -> String {
        let path = remote_path.trim_start_matches('/');
        match &self.public_url {
            Some(base) => format!("{}/{path}", base.trim_end_matches('/')),
            None => format!("/{path}"),
        }
    }

    fn signed_url(&self, remote_path: &str, _expires_in: Duration) -> String {
        self.url(remote_path)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let started = Instant::now();
        let meta = match fs::metadata(&self.root).await {
            Ok(meta) => meta,
            Err(e) => {
                return ConnectionTestResult::failure(
                    "Base directory does not exist",
                    format!("{}: {e}", self.root.display()),
                );
            }
        };
        if !meta.is_dir() {
            return ConnectionTestResult::failure(
                "Base path is not a directory",
                self.root.display().to_string(),
            );
        }

        let marker = self
            .root
            .join(format!(".write_test_{}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = fs::write(&marker, b"ok").await {
            return ConnectionTestResult::failure("Base directory is not writable", e.to_string());
        }
        let _ = fs::remove_file(&marker).await;

        let mut info = Map::new();
        info.insert(
            "basePath".to_string(),
            Value::String(self.root.display().to_string()),
        );
        ConnectionTestResult::success(
            "Local storage is accessible",
            elapsed_ms(started),
            Some(info),
        )
    }

    async fn quota(&self) -> Option<StorageQuota> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || Self::disk_quota(&root))
            .await
            .ok()
            .flatten()
    }

    async fn create_directory(&self, path: &str) -> bool {
        let target = self.resolve(path);
        match fs::create_dir_all(&target).await {
            Ok(()) => true,
            Err(e) => {
                warn!(path, error = %e, "Failed to create local directory");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use std::sync::Arc;

    fn adapter(root: &Path, public_url: Option<&str>) -> LocalStorageAdapter {
        LocalStorageAdapter::new(
            root,
            public_url.map(str::to_string),
            RetryExecutor::new(Arc::new(RecordingSleeper::new())),
        )
    }

    #[tokio::test]
    async fn test_upload_download_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(&dir.path().join("store"), None);
        let source = dir.path().join("in.mp4");
        fs::write(&source, b"frames").await.unwrap();

        let result = storage.upload(&source, "videos/1/720p/a.mp4").await;
        assert!(result.is_success());
        assert_eq!(result.remote_path(), Some("videos/1/720p/a.mp4"));
        assert!(storage.exists("videos/1/720p/a.mp4").await);

        let out = dir.path().join("out/nested/a.mp4");
        assert!(storage.download("videos/1/720p/a.mp4", &out).await);
        assert_eq!(fs::read(&out).await.unwrap(), b"frames");

        assert!(storage.delete("videos/1/720p/a.mp4").await);
        assert!(!storage.exists("videos/1/720p/a.mp4").await);
        assert!(storage.delete("videos/1/720p/a.mp4").await);
    }

    #[tokio::test]
    async fn test_upload_missing_local_file_fails_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let sleeper = RecordingSleeper::new();
        let storage = LocalStorageAdapter::new(
            dir.path(),
            None,
            RetryExecutor::new(Arc::new(sleeper.clone())),
        );
        let result = storage.upload(&dir.path().join("missing.mp4"), "a.mp4").await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("Local file does not exist"));
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn test_download_of_missing_file_is_false() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path(), None);
        assert!(!storage.download("nope.mp4", &dir.path().join("x")).await);
    }

    #[test]
    fn test_url_uses_public_url_when_configured() {
        let plain = adapter(Path::new("/srv"), None);
        assert_eq!(plain.url("videos/a.mp4"), "/videos/a.mp4");
        let public = adapter(Path::new("/srv"), Some("https://cdn.example.com/media/"));
        assert_eq!(public.url("/videos/a.mp4"), "https://cdn.example.com/media/videos/a.mp4");
        assert_eq!(
            public.signed_url("videos/a.mp4", Duration::from_secs(5)),
            public.url("videos/a.mp4")
        );
    }

    #[tokio::test]
    async fn test_connection_checks_base_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ok = adapter(dir.path(), None).test_connection().await;
        assert!(ok.success);
        assert!(ok.latency_ms.is_some());

        let missing = adapter(&dir.path().join("missing"), None).test_connection().await;
        assert!(!missing.success);
        assert!(missing.error_message.is_some());
    }

    #[tokio::test]
    async fn test_create_directory_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let storage = adapter(dir.path(), None);
        assert!(storage.create_directory("videos/1").await);
        assert!(storage.create_directory("videos/1").await);
        assert!(dir.path().join("videos/1").is_dir());
    }

    #[tokio::test]
    async fn test_quota_reports_known_total() {
        let dir = tempfile::tempdir().unwrap();
        if let Some(quota) = adapter(dir.path(), None).quota().await {
            assert!(quota.total_bytes.unwrap_or(0) >= quota.used_bytes);
        }
    }
}
