//! Cache manager that dispatches to the configured provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use mediahub_core::config::cache::CacheConfig;
use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_core::traits::cache::CacheProvider;

/// Cache manager that wraps the configured cache provider.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<dyn CacheProvider>,
}

impl CacheManager {
    /// Create a new cache manager from configuration.
    pub async fn new(config: &CacheConfig) -> AppResult<Self> {
        let inner: Arc<dyn CacheProvider> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis cache provider");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisCacheProvider::new(
                    client,
                    config.default_ttl_seconds,
                ))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory cache provider");
                Arc::new(crate::memory::MemoryCacheProvider::new(
                    &config.memory,
                    config.default_ttl_seconds,
                ))
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown cache provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// In-memory manager with default settings.
    #[cfg(feature = "memory")]
    pub fn in_memory() -> Self {
        let config = CacheConfig::default();
        Self::from_provider(Arc::new(crate::memory::MemoryCacheProvider::new(
            &config.memory,
            config.default_ttl_seconds,
        )))
    }

    /// Create a cache manager from an existing provider.
    pub fn from_provider(provider: Arc<dyn CacheProvider>) -> Self {
        Self { inner: provider }
    }
}

#[async_trait]
impl CacheProvider for CacheManager {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.inner.set(key, value, ttl).await
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.inner.set_default(key, value).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn incr(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        self.inner.incr(key, ttl).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_is_configuration_error() {
        let config = CacheConfig {
            provider: "memcached".to_string(),
            ..CacheConfig::default()
        };
        let err = CacheManager::new(&config).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_memory_manager_delegates() {
        let cache = CacheManager::new(&CacheConfig::default()).await.unwrap();
        cache.set_default("k", "v").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("v".to_string()));
        assert!(cache.health_check().await.unwrap());
    }
}
