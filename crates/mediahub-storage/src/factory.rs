//! Adapter factories and the registry that selects between them.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::storage::{Storage, StorageType};

use crate::adapter::StorageAdapter;
use crate::providers::{
    FtpConfig, HttpConfig, HttpStorageAdapter, LocalStorageAdapter, OperatorAdapter, SftpAuth,
    SftpConfig, SshSftpAdapter,
};
use crate::retry::RetryExecutor;
use crate::signing::SignedUrlService;
use crate::validation::require_valid_config;

/// Builds adapters for the storages it supports.
pub trait AdapterFactory: Send + Sync + std::fmt::Debug + 'static {
    /// Whether this factory can build an adapter for `storage`.
    fn supports(&self, storage: &Storage) -> bool;

    /// Validate the configuration and build the adapter.
    fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>>;
}

/// Local filesystem adapters.
#[derive(Debug, Clone)]
pub struct LocalAdapterFactory {
    default_root: PathBuf,
    retry: RetryExecutor,
}

impl LocalAdapterFactory {
    /// Storages without `basePath` are rooted at `default_root`.
    pub fn new(default_root: impl Into<PathBuf>, retry: RetryExecutor) -> Self {
        Self {
            default_root: default_root.into(),
            retry,
        }
    }
}

impl AdapterFactory for LocalAdapterFactory {
    fn supports(&self, storage: &Storage) -> bool {
        storage.storage_type == StorageType::Local
    }

    fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        require_valid_config(storage)?;
        Ok(Arc::new(LocalStorageAdapter::from_storage(
            storage,
            &self.default_root,
            self.retry.clone(),
        )))
    }
}

/// FTP/FTPS adapters.
#[derive(Debug, Clone)]
pub struct FtpAdapterFactory {
    signing: Arc<SignedUrlService>,
    retry: RetryExecutor,
}

impl FtpAdapterFactory {
    pub fn new(signing: Arc<SignedUrlService>, retry: RetryExecutor) -> Self {
        Self { signing, retry }
    }
}

impl AdapterFactory for FtpAdapterFactory {
    fn supports(&self, storage: &Storage) -> bool {
        storage.storage_type == StorageType::Ftp
    }

    fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        require_valid_config(storage)?;
        let config = FtpConfig::from_storage(storage)?;
        let adapter = OperatorAdapter::new(
            storage.id,
            StorageType::Ftp,
            config.operator()?,
            self.signing.clone(),
            self.retry.clone(),
        )
        .with_server_info(config.server_info());
        Ok(Arc::new(adapter))
    }
}

/// SFTP adapters: opendal for key logins, the native SSH client for passwords.
#[derive(Debug, Clone)]
pub struct SftpAdapterFactory {
    signing: Arc<SignedUrlService>,
    retry: RetryExecutor,
}

impl SftpAdapterFactory {
    pub fn new(signing: Arc<SignedUrlService>, retry: RetryExecutor) -> Self {
        Self { signing, retry }
    }
}

impl AdapterFactory for SftpAdapterFactory {
    fn supports(&self, storage: &Storage) -> bool {
        storage.storage_type == StorageType::Sftp
    }

    fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        require_valid_config(storage)?;
        let config = SftpConfig::from_storage(storage)?;
        if let SftpAuth::Password { .. } = config.auth {
            return Ok(Arc::new(SshSftpAdapter::new(
                storage.id,
                config,
                self.signing.clone(),
                self.retry.clone(),
            )?));
        }
        let adapter = OperatorAdapter::new(
            storage.id,
            StorageType::Sftp,
            config.operator()?,
            self.signing.clone(),
            self.retry.clone(),
        )
        .with_server_info(config.server_info());
        Ok(Arc::new(adapter))
    }
}

/// HTTP object storage adapters.
#[derive(Debug, Clone)]
pub struct HttpAdapterFactory {
    retry: RetryExecutor,
}

impl HttpAdapterFactory {
    pub fn new(retry: RetryExecutor) -> Self {
        Self { retry }
    }
}

impl AdapterFactory for HttpAdapterFactory {
    fn supports(&self, storage: &Storage) -> bool {
        storage.storage_type == StorageType::Http
    }

    fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        require_valid_config(storage)?;
        let config = HttpConfig::from_storage(storage)?;
        Ok(Arc::new(HttpStorageAdapter::new(config, self.retry.clone())?))
    }
}

/// Ordered list of factories; the first that supports a storage builds its adapter.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    factories: Vec<Arc<dyn AdapterFactory>>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the four built-in factories.
    pub fn with_defaults(
        media_root: impl Into<PathBuf>,
        signing: Arc<SignedUrlService>,
        retry: RetryExecutor,
    ) -> Self {
        Self::new()
            .register(Arc::new(LocalAdapterFactory::new(media_root, retry.clone())))
            .register(Arc::new(FtpAdapterFactory::new(signing.clone(), retry.clone())))
            .register(Arc::new(SftpAdapterFactory::new(signing, retry.clone())))
            .register(Arc::new(HttpAdapterFactory::new(retry)))
    }

    /// Append a factory.
    pub fn register(mut self, factory: Arc<dyn AdapterFactory>) -> Self {
        self.factories.push(factory);
        self
    }

    /// Build the adapter for `storage`.
    pub fn create(&self, storage: &Storage) -> AppResult<Arc<dyn StorageAdapter>> {
        let factory = self
            .factories
            .iter()
            .find(|f| f.supports(storage))
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "No factory found for storage type \"{}\"",
                    storage.storage_type
                ))
            })?;
        debug!(storage_id = %storage.id, storage_type = %storage.storage_type, "Creating storage adapter");
        factory.create(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;
    use mediahub_core::types::StorageId;
    use serde_json::json;

    fn retry() -> RetryExecutor {
        RetryExecutor::new(Arc::new(RecordingSleeper::new()))
    }

    fn registry() -> AdapterRegistry {
        AdapterRegistry::with_defaults(
            "/tmp/media",
            Arc::new(SignedUrlService::new("k")),
            retry(),
        )
    }

    #[test]
    fn test_each_type_gets_its_adapter() {
        let registry = registry();
        let local = Storage::new(StorageId::new(1), "disk", StorageType::Local, json!({}));
        assert_eq!(registry.create(&local).unwrap().storage_type(), StorageType::Local);

        let ftp = Storage::new(
            StorageId::new(2),
            "ftp",
            StorageType::Ftp,
            json!({ "host": "h", "port": 21, "username": "u", "password": "p", "basePath": "/m" }),
        );
        assert_eq!(registry.create(&ftp).unwrap().storage_type(), StorageType::Ftp);

        let http = Storage::new(
            StorageId::new(3),
            "cdn",
            StorageType::Http,
            json!({ "baseUrl": "https://cdn.example.com", "authToken": "t", "uploadEndpoint": "/u" }),
        );
        assert_eq!(registry.create(&http).unwrap().storage_type(), StorageType::Http);
    }

    #[test]
    fn test_empty_registry_names_the_type() {
        let storage = Storage::new(StorageId::new(1), "disk", StorageType::Local, json!({}));
        let err = AdapterRegistry::new().create(&storage).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(err.message, "No factory found for storage type \"local\"");
    }

    #[test]
    fn test_invalid_config_is_rejected_before_building() {
        let ftp = Storage::new(
            StorageId::new(2),
            "ftp",
            StorageType::Ftp,
            json!({ "host": "h", "port": 0, "username": "u", "password": "p", "basePath": "/m" }),
        );
        let err = registry().create(&ftp).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.message.contains("port"));
    }

    #[test]
    fn test_sftp_builds_for_both_auth_types() {
        let password = Storage::new(
            StorageId::new(4),
            "sftp",
            StorageType::Sftp,
            json!({
                "host": "h", "port": 22, "username": "u",
                "authType": "password", "password": "p", "basePath": "/m"
            }),
        );
        let adapter = registry().create(&password).unwrap();
        assert_eq!(adapter.storage_type(), StorageType::Sftp);
        assert_eq!(adapter.url("videos/a.mp4"), "/storage/proxy/videos/a.mp4?storage=4");

        let key = Storage::new(
            StorageId::new(5),
            "sftp-key",
            StorageType::Sftp,
            json!({
                "host": "h", "port": 22, "username": "u",
                "authType": "key", "privateKey": "/etc/mediahub/id_ed25519", "basePath": "/m"
            }),
        );
        assert_eq!(registry().create(&key).unwrap().storage_type(), StorageType::Sftp);
    }

    #[test]
    fn test_first_supporting_factory_wins() {
        let custom_root = LocalAdapterFactory::new("/custom", retry());
        let registry = AdapterRegistry::new()
            .register(Arc::new(custom_root))
            .register(Arc::new(LocalAdapterFactory::new("/other", retry())));
        let storage = Storage::new(StorageId::new(1), "disk", StorageType::Local, json!({}));
        let adapter = registry.create(&storage).unwrap();
        assert_eq!(adapter.url("a.mp4"), "/a.mp4");
    }
}
