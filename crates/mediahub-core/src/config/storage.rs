//! Media storage and URL signing configuration.

use serde::{Deserialize, Serialize};

/// Process-wide media storage settings.
///
/// Backend-specific settings (hosts, credentials, endpoints) live on each
/// `Storage` record, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of locally stored media (relative file paths resolve here).
    #[serde(default = "default_media_root")]
    pub media_root: String,
    /// Directory for scoped temporary files (migration staging, proxy streaming).
    /// Empty means the system temp directory.
    #[serde(default)]
    pub temp_dir: String,
    /// How long a storage quota lookup is cached, in seconds.
    #[serde(default = "default_quota_cache")]
    pub quota_cache_seconds: u64,
    /// Default lifetime of signed proxy URLs, in seconds.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_root: default_media_root(),
            temp_dir: String::new(),
            quota_cache_seconds: default_quota_cache(),
            signed_url_ttl_seconds: default_signed_url_ttl(),
        }
    }
}

impl StorageConfig {
    /// Resolve the temp directory, falling back to the system default.
    pub fn temp_dir(&self) -> std::path::PathBuf {
        if self.temp_dir.trim().is_empty() {
            std::env::temp_dir()
        } else {
            std::path::PathBuf::from(&self.temp_dir)
        }
    }
}

/// Signed URL configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    /// HMAC secret used to sign proxy URLs.
    #[serde(default)]
    pub secret: String,
}

fn default_media_root() -> String {
    "./data/media".to_string()
}

fn default_quota_cache() -> u64 {
    300
}

fn default_signed_url_ttl() -> u64 {
    3600
}
