//! Adapter over an opendal operator, shared by the FTP and SFTP backends.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use opendal::Operator;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::storage::{ConnectionTestResult, StorageQuota, StorageType, UploadResult};

use crate::adapter::{StorageAdapter, elapsed_ms, remote_parent};
use crate::proxy::{proxy_url, signed_proxy_url};
use crate::retry::RetryExecutor;
use crate::signing::SignedUrlService;

use super::local::ensure_parent;

/// Bytes moved per read or write call.
const CHUNK_SIZE: usize = 1024 * 1024;

/// Map an opendal error into a storage error with context.
pub(crate) fn opendal_error(context: impl Into<String>, e: opendal::Error) -> AppError {
    AppError::with_source(ErrorKind::Storage, context, e)
}

/// Storage adapter for backends reached through an opendal [`Operator`].
///
/// The operator is rooted at the storage's `basePath`, so every path handed
/// to it is relative. Files are served to clients through the signed proxy.
#[derive(Debug, Clone)]
pub struct OperatorAdapter {
    storage_id: StorageId,
    storage_type: StorageType,
    operator: Operator,
    signing: Arc<SignedUrlService>,
    retry: RetryExecutor,
    server_info: Map<String, Value>,
}

impl OperatorAdapter {
    /// Wrap an operator for the given storage.
    pub fn new(
        storage_id: StorageId,
        storage_type: StorageType,
        operator: Operator,
        signing: Arc<SignedUrlService>,
        retry: RetryExecutor,
    ) -> Self {
        Self {
            storage_id,
            storage_type,
            operator,
            signing,
            retry,
            server_info: Map::new(),
        }
    }

    /// Details reported by a successful connection test.
    pub fn with_server_info(mut self, server_info: Map<String, Value>) -> Self {
        self.server_info = server_info;
        self
    }

    fn relative(path: &str) -> &str {
        path.trim_start_matches('/')
    }

    fn dir_path(path: &str) -> String {
        format!("{}/", Self::relative(path).trim_end_matches('/'))
    }

    /// Create a directory; backends without directories count as success.
    async fn make_dir(&self, path: &str) -> opendal::Result<()> {
        match self.operator.create_dir(&Self::dir_path(path)).await {
            Err(e) if e.kind() == opendal::ErrorKind::Unsupported => Ok(()),
            other => other,
        }
    }

    async fn write_file(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        if let Some(parent) = remote_parent(remote_path) {
            self.make_dir(parent)
                .await
                .map_err(|e| opendal_error(format!("Failed to create directory: {parent}"), e))?;
        }
        let file = fs::File::open(local_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open local file: {}", local_path.display()),
                e,
            )
        })?;
        let mut writer = self
            .operator
            .writer(Self::relative(remote_path))
            .await
            .map_err(|e| opendal_error(format!("Failed to open {remote_path} for writing"), e))?;

        let mut chunks = ReaderStream::with_capacity(file, CHUNK_SIZE);
        while let Some(chunk) = chunks.next().await {
            let written = match chunk {
                Ok(bytes) => writer
                    .write(bytes)
                    .await
                    .map_err(|e| opendal_error(format!("Failed to write {remote_path}"), e)),
                Err(e) => Err(AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to read local file: {}", local_path.display()),
                    e,
                )),
            };
            if let Err(e) = written {
                if let Err(abort) = writer.abort().await {
                    debug!(remote_path, error = %abort, "Failed to abort partial write");
                }
                return Err(e);
            }
        }
        writer
            .close()
            .await
            .map(|_| ())
            .map_err(|e| opendal_error(format!("Failed to finish {remote_path}"), e))
    }

    async fn read_file(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        let relative = Self::relative(remote_path);
        let size = self
            .operator
            .stat(relative)
            .await
            .map_err(|e| opendal_error(format!("Failed to stat {remote_path}"), e))?
            .content_length();
        let reader = self
            .operator
            .reader(relative)
            .await
            .map_err(|e| opendal_error(format!("Failed to read {remote_path}"), e))?;

        ensure_parent(local_path).await?;
        let mut file = fs::File::create(local_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {}", local_path.display()),
                e,
            )
        })?;

        let mut offset = 0u64;
        while offset < size {
            let end = size.min(offset + CHUNK_SIZE as u64);
            let chunk = reader
                .read(offset..end)
                .await
                .map_err(|e| opendal_error(format!("Failed to read {remote_path}"), e))?
                .to_bytes();
            if chunk.is_empty() {
                return Err(AppError::storage(format!(
                    "Unexpected end of {remote_path} at byte {offset}"
                )));
            }
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
            offset += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))
    }
}

#[async_trait]
impl StorageAdapter for OperatorAdapter {
    fn storage_type(&self) -> StorageType {
        self.storage_type
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadResult {
        if !local_path.is_file() {
            return UploadResult::failure(format!(
                "Local file does not exist: {}",
                local_path.display()
            ));
        }
        match self
            .retry
            .execute("upload", || self.write_file(local_path, remote_path))
            .await
        {
            Ok(()) => {
                debug!(storage_id = %self.storage_id, remote_path, "Uploaded file");
                UploadResult::success(remote_path)
            }
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Upload failed");
                UploadResult::failure(e.to_string())
            }
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> bool {
        match self
            .retry
            .execute("download", || self.read_file(remote_path, local_path))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Download failed");
                false
            }
        }
    }

    async fn delete(&self, remote_path: &str) -> bool {
        let result = self
            .retry
            .execute("delete", || async {
                self.operator
                    .delete(Self::relative(remote_path))
                    .await
                    .map_err(|e| opendal_error(format!("Failed to delete {remote_path}"), e))
            })
            .await;
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Delete failed");
                false
            }
        }
    }

    async fn exists(&self, remote_path: &str) -> bool {
        self.retry
            .execute("exists", || async {
                self.operator
                    .exists(Self::relative(remote_path))
                    .await
                    .map_err(|e| opendal_error(format!("Failed to stat {remote_path}"), e))
            })
            .await
            .unwrap_or(false)
    }

    fn url(&self, remote_path: &str) -> String {
        proxy_url(remote_path, self.storage_id)
    }

    fn signed_url(&self, remote_path: &str, expires_in: Duration) -> String {
        signed_proxy_url(&self.signing, remote_path, self.storage_id, expires_in)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let started = Instant::now();
        match self.operator.check().await {
            Ok(()) => ConnectionTestResult::success(
                format!("{} connection successful", self.storage_type.as_str().to_uppercase()),
                elapsed_ms(started),
                Some(self.server_info.clone()),
            ),
            Err(e) => ConnectionTestResult::failure(
                format!("{} connection failed", self.storage_type.as_str().to_uppercase()),
                e.to_string(),
            ),
        }
    }

    async fn quota(&self) -> Option<StorageQuota> {
        None
    }

    async fn create_directory(&self, path: &str) -> bool {
        match self.make_dir(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, path, error = %e, "Failed to create directory");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use opendal::services::Memory;

    fn adapter() -> OperatorAdapter {
        let operator = Operator::new(Memory::default()).unwrap().finish();
        OperatorAdapter::new(
            StorageId::new(9),
            StorageType::Sftp,
            operator,
            Arc::new(SignedUrlService::new("k").with_clock(|| 100)),
            RetryExecutor::new(Arc::new(RecordingSleeper::new())),
        )
    }

    #[tokio::test]
    async fn test_transfer_roundtrip_through_operator() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("in.mp4");
        fs::write(&local, b"payload").await.unwrap();
        let storage = adapter();

        let result = storage.upload(&local, "videos/3/480p/video_x.mp4").await;
        assert!(result.is_success());
        assert!(storage.exists("videos/3/480p/video_x.mp4").await);

        let out = dir.path().join("copy/out.mp4");
        assert!(storage.download("videos/3/480p/video_x.mp4", &out).await);
        assert_eq!(fs::read(&out).await.unwrap(), b"payload");

        assert!(storage.delete("videos/3/480p/video_x.mp4").await);
        assert!(!storage.exists("videos/3/480p/video_x.mp4").await);
        assert!(storage.delete("videos/3/480p/video_x.mp4").await);
    }

    #[tokio::test]
    async fn test_large_file_moves_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("big.mp4");
        let payload: Vec<u8> = (0..CHUNK_SIZE * 2 + 123).map(|i| (i % 251) as u8).collect();
        fs::write(&local, &payload).await.unwrap();
        let storage = adapter();

        assert!(storage.upload(&local, "videos/big.mp4").await.is_success());
        let out = dir.path().join("back.mp4");
        assert!(storage.download("videos/big.mp4", &out).await);
        assert_eq!(fs::read(&out).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_empty_file_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("empty.mp4");
        fs::write(&local, b"").await.unwrap();
        let storage = adapter();

        assert!(storage.upload(&local, "empty.mp4").await.is_success());
        let out = dir.path().join("empty-out.mp4");
        assert!(storage.download("empty.mp4", &out).await);
        assert!(fs::read(&out).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_download_missing_file_is_false() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!adapter().download("missing.mp4", &dir.path().join("x")).await);
    }

    #[test]
    fn test_urls_go_through_the_proxy() {
        let storage = adapter();
        assert_eq!(storage.url("videos/a.mp4"), "/storage/proxy/videos/a.mp4?storage=9");
        let signed = storage.signed_url("videos/a.mp4", Duration::from_secs(60));
        assert!(signed.starts_with("/storage/proxy/videos/a.mp4?expires=160&signature="));
        assert!(signed.ends_with("&storage=9"));
    }

    #[tokio::test]
    async fn test_quota_is_unknown() {
        assert!(adapter().quota().await.is_none());
    }

    #[tokio::test]
    async fn test_memory_operator_passes_connection_test() {
        let result = adapter().test_connection().await;
        assert!(result.success, "{result:?}");
        assert!(result.latency_ms.is_some());
    }
}
