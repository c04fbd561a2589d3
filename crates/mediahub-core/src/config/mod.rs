//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from
//! TOML files and `MEDIAHUB__*` environment variables. Each sub-module
//! represents a logical configuration section.

pub mod app;
pub mod cache;
pub mod database;
pub mod logging;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::app::ServerConfig;
pub use self::cache::CacheConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::storage::{SigningConfig, StorageConfig};
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// configuration (default file + environment overlay + env variables).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Cache provider settings.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Media storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Signed URL settings.
    #[serde(default)]
    pub signing: SigningConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration.
    ///
    /// Merges `config/default`, an environment-specific overlay
    /// (`config/{env}`) and environment variables prefixed with
    /// `MEDIAHUB__` (e.g. `MEDIAHUB__SIGNING__SECRET`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("MEDIAHUB")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AppConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.cache.provider, "memory");
        assert_eq!(config.storage.quota_cache_seconds, 300);
        assert_eq!(config.storage.signed_url_ttl_seconds, 3600);
        assert_eq!(config.worker.concurrency, 4);
        assert!(config.database.url.is_empty());
        assert_eq!(config.logging.format, "json");
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: AppConfig = serde_json::from_value(serde_json::json!({
            "signing": { "secret": "s3cr3t" },
            "worker": { "concurrency": 8 }
        }))
        .unwrap();
        assert_eq!(config.signing.secret, "s3cr3t");
        assert_eq!(config.worker.concurrency, 8);
        assert!(config.worker.enabled);
    }
}
