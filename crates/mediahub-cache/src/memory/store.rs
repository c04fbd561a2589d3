//! In-memory cache implementation using the moka crate.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use moka::Expiry;
use moka::future::Cache;
use tracing::debug;

use mediahub_core::config::cache::MemoryCacheConfig;
use mediahub_core::result::AppResult;
use mediahub_core::traits::cache::CacheProvider;

/// A cached value together with the TTL it was written with.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    ttl: Duration,
}

/// Per-entry expiry: every write restarts the entry's own TTL.
struct EntryExpiry;

impl Expiry<String, CacheEntry> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// Expired counters are swept once every this many `incr` calls.
const SWEEP_EVERY: u64 = 128;

/// Atomic counter slot.
#[derive(Debug)]
struct Counter {
    value: i64,
    expires_at: Instant,
}

/// In-memory cache provider using moka.
#[derive(Debug, Clone)]
pub struct MemoryCacheProvider {
    /// The underlying moka cache.
    cache: Cache<String, CacheEntry>,
    /// Default TTL for entries.
    default_ttl: Duration,
    /// Counters stored separately for atomic incr.
    counters: Arc<DashMap<String, Counter>>,
    /// `incr` calls so far, drives the counter sweep.
    incr_calls: Arc<AtomicU64>,
}

impl MemoryCacheProvider {
    /// Create a new in-memory cache from configuration.
    pub fn new(config: &MemoryCacheConfig, default_ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_live(Duration::from_secs(config.time_to_live_seconds))
            .expire_after(EntryExpiry)
            .build();

        Self {
            cache,
            default_ttl: Duration::from_secs(default_ttl_seconds),
            counters: Arc::new(DashMap::new()),
            incr_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Drop every counter whose TTL has passed.
    fn sweep_expired_counters(&self) {
        let now = Instant::now();
        let before = self.counters.len();
        self.counters.retain(|_, counter| counter.expires_at > now);
        let removed = before.saturating_sub(self.counters.len());
        if removed > 0 {
            debug!(removed, "Evicted expired counters");
        }
    }

    fn live_counter(&self, key: &str) -> Option<i64> {
        let now = Instant::now();
        let value = self
            .counters
            .get(key)
            .map(|counter| (counter.value, counter.expires_at > now));
        match value {
            Some((value, true)) => Some(value),
            Some((_, false)) => {
                self.counters.remove_if(key, |_, counter| counter.expires_at <= now);
                None
            }
            None => None,
        }
    }
}

#[async_trait]
impl CacheProvider for MemoryCacheProvider {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        if let Some(value) = self.live_counter(key) {
            return Ok(Some(value.to_string()));
        }
        Ok(self.cache.get(key).await.map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> AppResult<()> {
        self.counters.remove(key);
        self.cache
            .insert(
                key.to_string(),
                CacheEntry {
                    value: value.to_string(),
                    ttl,
                },
            )
            .await;
        Ok(())
    }

    async fn set_default(&self, key: &str, value: &str) -> AppResult<()> {
        self.set(key, value, self.default_ttl).await
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.cache.remove(key).await;
        self.counters.remove(key);
        Ok(())
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        if self.live_counter(key).is_some() {
            return Ok(true);
        }
        Ok(self.cache.get(key).await.is_some())
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> AppResult<bool> {
        let entry = self
            .cache
            .entry_by_ref(key)
            .or_insert(CacheEntry {
                value: value.to_string(),
                ttl,
            })
            .await;
        let inserted = entry.is_fresh();
        debug!(key, inserted, "set_nx");
        Ok(inserted)
    }

    async fn incr(&self, key: &str, ttl: Duration) -> AppResult<i64> {
        if self.incr_calls.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == SWEEP_EVERY - 1 {
            self.sweep_expired_counters();
        }
        let now = Instant::now();
        let mut counter = self.counters.entry(key.to_string()).or_insert(Counter {
            value: 0,
            expires_at: now + ttl,
        });
        if counter.expires_at <= now {
            counter.value = 0;
        }
        counter.value += 1;
        counter.expires_at = now + ttl;
        Ok(counter.value)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
