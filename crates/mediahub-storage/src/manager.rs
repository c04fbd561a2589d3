//! Storage manager: resolves storages to adapters and runs file operations
//! against them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use serde::Serialize;
use tokio::fs;
use tracing::{debug, info, warn};

use mediahub_core::config::StorageConfig;
use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::storage::{
    ConnectionTestResult, Storage, StorageQuota, StorageStore, UploadResult,
};
use mediahub_entity::video_file::VideoFile;

use crate::adapter::{StorageAdapter, remote_parent};
use crate::factory::AdapterRegistry;
use crate::proxy::ProxyDownload;
use crate::signing::SignedUrlService;
use crate::validation::validate_remote_path;

const ADAPTER_CACHE_CAPACITY: u64 = 256;
const ADAPTER_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Outcome of a bulk delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkDeleteResult {
    /// Paths removed (or already absent).
    pub deleted: usize,
    /// Paths the adapter could not remove.
    pub failed: usize,
}

/// Central entry point for file operations on configured storages.
///
/// Adapters are built on first use and cached per storage id; call
/// [`StorageManager::invalidate`] after a storage record changes.
#[derive(Clone)]
pub struct StorageManager {
    store: Arc<dyn StorageStore>,
    registry: AdapterRegistry,
    signing: Arc<SignedUrlService>,
    adapters: Cache<StorageId, Arc<dyn StorageAdapter>>,
    quotas: Cache<StorageId, Option<StorageQuota>>,
    media_root: PathBuf,
    temp_dir: PathBuf,
    signed_url_ttl: Duration,
}

impl std::fmt::Debug for StorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageManager")
            .field("media_root", &self.media_root)
            .field("temp_dir", &self.temp_dir)
            .field("cached_adapters", &self.adapters.entry_count())
            .finish()
    }
}

impl StorageManager {
    /// Create a manager over the given storage catalog.
    pub fn new(
        store: Arc<dyn StorageStore>,
        registry: AdapterRegistry,
        signing: Arc<SignedUrlService>,
        config: &StorageConfig,
    ) -> Self {
        let adapters = Cache::builder()
            .max_capacity(ADAPTER_CACHE_CAPACITY)
            .time_to_live(ADAPTER_CACHE_TTL)
            .build();
        let quotas = Cache::builder()
            .max_capacity(ADAPTER_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(config.quota_cache_seconds))
            .build();

        Self {
            store,
            registry,
            signing,
            adapters,
            quotas,
            media_root: PathBuf::from(&config.media_root),
            temp_dir: config.temp_dir(),
            signed_url_ttl: Duration::from_secs(config.signed_url_ttl_seconds),
        }
    }

    /// Root directory of locally stored media.
    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    /// Directory for scoped temporary files.
    pub fn temp_dir(&self) -> &Path {
        &self.temp_dir
    }

    /// Default signed URL lifetime.
    pub fn signed_url_ttl(&self) -> Duration {
        self.signed_url_ttl
    }

    /// Signing service shared with the proxy endpoint.
    pub fn signing(&self) -> &Arc<SignedUrlService> {
        &self.signing
    }

    /// Absolute local path of a rendition's file.
    pub fn local_path(&self, file: &VideoFile) -> PathBuf {
        let path = Path::new(&file.path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.media_root.join(path)
        }
    }

    /// Look up a storage record.
    pub async fn find_storage(&self, id: StorageId) -> AppResult<Option<Storage>> {
        self.store.find_storage_by_id(id).await
    }

    /// The storage new uploads go to, if one is configured.
    pub async fn default_storage(&self) -> AppResult<Option<Storage>> {
        self.store.find_default_storage().await
    }

    /// Adapter for an enabled storage.
    pub async fn adapter_for(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        if !storage.is_enabled {
            return Err(AppError::configuration(format!(
                "Storage \"{}\" is disabled",
                storage.name
            )));
        }
        self.cached_adapter(storage).await
    }

    async fn cached_adapter(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        if let Some(adapter) = self.adapters.get(&storage.id).await {
            return Ok(adapter);
        }
        let adapter = self.registry.create(storage)?;
        self.adapters.insert(storage.id, adapter.clone()).await;
        Ok(adapter)
    }

    /// Drop the cached adapter and quota of a storage.
    pub async fn invalidate(&self, storage_id: StorageId) {
        self.adapters.invalidate(&storage_id).await;
        self.quotas.invalidate(&storage_id).await;
        debug!(%storage_id, "Invalidated storage adapter cache");
    }

    /// Upload a local file to `storage`, or to the default storage when `None`.
    ///
    /// Returns a failed [`UploadResult`] when there is no default storage or the
    /// local file is missing. A disabled storage, an invalid remote path or a
    /// full storage are errors.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        storage: Option<&Storage>,
    ) -> AppResult<UploadResult> {
        validate_remote_path(remote_path)?;

        let default;
        let storage = match storage {
            Some(storage) => storage,
            None => match self.store.find_default_storage().await? {
                Some(found) => {
                    default = found;
                    &default
                }
                None => return Ok(UploadResult::failure("No default storage configured")),
            },
        };

        if !storage.is_enabled {
            return Err(AppError::configuration(format!(
                "Storage \"{}\" is disabled and cannot accept uploads",
                storage.name
            )));
        }

        let size = match fs::metadata(local_path).await {
            Ok(meta) if meta.is_file() => i64::try_from(meta.len()).unwrap_or(i64::MAX),
            _ => {
                return Ok(UploadResult::failure(format!(
                    "Local file does not exist: {}",
                    local_path.display()
                )));
            }
        };

        if let Some(quota) = self.storage_quota(storage).await
            && quota.would_exceed(size)
        {
            return Err(AppError::storage(format!(
                "Insufficient space on storage \"{}\": {} bytes needed, {} bytes available",
                storage.name,
                size,
                quota.available_bytes().unwrap_or(0)
            )));
        }

        let adapter = self.adapter_for(storage).await?;
        if let Some(parent) = remote_parent(remote_path)
            && !adapter.create_directory(parent).await
        {
            warn!(storage = %storage.name, parent, "Could not create remote directory");
        }

        let result = adapter.upload(local_path, remote_path).await;
        if result.is_success() {
            self.quotas.invalidate(&storage.id).await;
            info!(storage = %storage.name, remote_path, size, "Uploaded file");
        } else {
            warn!(
                storage = %storage.name,
                remote_path,
                error = result.error_message().unwrap_or_default(),
                "Upload failed"
            );
        }
        Ok(result)
    }

    /// Download a remote file from `storage` to `local_path`.
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        storage: &Storage,
    ) -> AppResult<bool> {
        let adapter = self.adapter_for(storage).await?;
        Ok(adapter.download(remote_path, local_path).await)
    }

    /// Stage a remote file in the temp directory for the proxy endpoint.
    ///
    /// `Ok(None)` when the backend could not deliver the file.
    pub async fn proxy_download(
        &self,
        remote_path: &str,
        storage: &Storage,
    ) -> AppResult<Option<ProxyDownload>> {
        validate_remote_path(remote_path)?;
        let adapter = self.adapter_for(storage).await?;
        ProxyDownload::fetch(adapter.as_ref(), remote_path, &self.temp_dir).await
    }

    /// Delete one remote file. Missing files count as deleted.
    pub async fn delete_file(&self, remote_path: &str, storage: &Storage) -> AppResult<bool> {
        let adapter = self.adapter_for(storage).await?;
        let deleted = adapter.delete(remote_path).await;
        if deleted {
            self.quotas.invalidate(&storage.id).await;
        }
        Ok(deleted)
    }

    /// Delete several remote files, counting outcomes.
    pub async fn delete_files(
        &self,
        remote_paths: &[String],
        storage: &Storage,
    ) -> AppResult<BulkDeleteResult> {
        let adapter = self.adapter_for(storage).await?;
        let mut result = BulkDeleteResult::default();
        for path in remote_paths {
            if adapter.delete(path).await {
                result.deleted += 1;
            } else {
                result.failed += 1;
            }
        }
        if result.deleted > 0 {
            self.quotas.invalidate(&storage.id).await;
        }
        info!(
            storage = %storage.name,
            deleted = result.deleted,
            failed = result.failed,
            "Bulk delete finished"
        );
        Ok(result)
    }

    /// Whether a remote file exists.
    pub async fn file_exists(&self, remote_path: &str, storage: &Storage) -> AppResult<bool> {
        let adapter = self.adapter_for(storage).await?;
        Ok(adapter.exists(remote_path).await)
    }

    /// Whether the bytes a rendition points at are reachable.
    pub async fn verify_file_integrity(&self, file: &VideoFile) -> AppResult<bool> {
        let Some((storage_id, remote_path)) = file.remote_location() else {
            return Ok(fs::try_exists(self.local_path(file)).await.unwrap_or(false));
        };
        match self.store.find_storage_by_id(storage_id).await? {
            Some(storage) => self.file_exists(remote_path, &storage).await,
            None => {
                warn!(%storage_id, "Rendition references a missing storage");
                Ok(false)
            }
        }
    }

    /// Public URL of a rendition.
    ///
    /// Local-only renditions and unresolvable storage references yield the
    /// local path unchanged.
    pub async fn file_url(&self, file: &VideoFile) -> AppResult<String> {
        match self.remote_adapter(file).await? {
            Some((adapter, remote_path)) => Ok(adapter.url(remote_path)),
            None => Ok(file.path.clone()),
        }
    }

    /// Like [`StorageManager::file_url`], with a signed proxy URL for FTP and SFTP.
    pub async fn signed_file_url(
        &self,
        file: &VideoFile,
        expires_in: Duration,
    ) -> AppResult<String> {
        match self.remote_adapter(file).await? {
            Some((adapter, remote_path)) => Ok(adapter.signed_url(remote_path, expires_in)),
            None => Ok(file.path.clone()),
        }
    }

    async fn remote_adapter<'a>(
        &self,
        file: &'a VideoFile,
    ) -> AppResult<Option<(Arc<dyn StorageAdapter>, &'a str)>> {
        let Some((storage_id, remote_path)) = file.remote_location() else {
            return Ok(None);
        };
        let Some(storage) = self.store.find_storage_by_id(storage_id).await? else {
            warn!(%storage_id, file_id = ?file.id, "Storage not found, using local path");
            return Ok(None);
        };
        match self.cached_adapter(&storage).await {
            Ok(adapter) => Ok(Some((adapter, remote_path))),
            Err(e) => {
                warn!(%storage_id, error = %e, "Storage adapter unavailable, using local path");
                Ok(None)
            }
        }
    }

    /// Quota of an enabled storage, cached for the configured period.
    ///
    /// Unknown, unsupported and failed lookups all yield `None`.
    pub async fn storage_quota(&self, storage: &Storage) -> Option<StorageQuota> {
        if !storage.is_enabled {
            return None;
        }
        if let Some(cached) = self.quotas.get(&storage.id).await {
            return cached;
        }
        let quota = match self.cached_adapter(storage).await {
            Ok(adapter) => adapter.quota().await,
            Err(e) => {
                warn!(storage = %storage.name, error = %e, "Cannot query storage quota");
                return None;
            }
        };
        self.quotas.insert(storage.id, quota).await;
        quota
    }

    /// Test a storage with a freshly built adapter.
    pub async fn test_connection(&self, storage: &Storage) -> ConnectionTestResult {
        match self.registry.create(storage) {
            Ok(adapter) => adapter.test_connection().await,
            Err(e) if e.kind == ErrorKind::Configuration || e.kind == ErrorKind::Validation => {
                ConnectionTestResult::failure("Invalid storage configuration", e.message)
            }
            Err(e) => ConnectionTestResult::failure("Connection failed", e.to_string()),
        }
    }
}
