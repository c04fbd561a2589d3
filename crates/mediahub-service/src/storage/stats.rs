//! File counts, sizes and quota warnings per storage.

use std::sync::Arc;

use serde::Serialize;

use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::storage::{
    Storage, StorageQuota, StorageStore, StorageType, WARNING_THRESHOLD_PERCENT,
};
use mediahub_entity::video_file::{VideoFile, VideoFileStore};
use mediahub_storage::StorageManager;

use super::migration::LOCAL_STORAGE_NAME;

/// Files held by one storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageFileStats {
    pub files_count: u64,
    pub total_size: i64,
}

impl StorageFileStats {
    fn from_files(files: &[VideoFile]) -> Self {
        files.iter().fold(Self::default(), |acc, f| Self {
            files_count: acc.files_count + 1,
            total_size: acc.total_size.saturating_add(f.file_size),
        })
    }
}

/// One row of the storage overview. `id` is `None` for local disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageStatsEntry {
    pub id: Option<StorageId>,
    pub name: String,
    pub storage_type: StorageType,
    pub is_enabled: bool,
    pub is_default: bool,
    pub stats: StorageFileStats,
    pub quota: Option<StorageQuota>,
    pub usage_percent: Option<f64>,
    pub warning: bool,
}

/// Totals across local disk and every configured storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TotalStats {
    pub files_count: u64,
    pub total_size: i64,
    /// Configured storages plus one for local disk.
    pub storages_count: u64,
}

/// A storage at or above the usage warning threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageWarning {
    pub name: String,
    pub usage_percent: f64,
}

/// Aggregates rendition statistics for the storage overview.
#[derive(Debug, Clone)]
pub struct StorageStatsService {
    manager: Arc<StorageManager>,
    storages: Arc<dyn StorageStore>,
    files: Arc<dyn VideoFileStore>,
}

impl StorageStatsService {
    pub fn new(
        manager: Arc<StorageManager>,
        storages: Arc<dyn StorageStore>,
        files: Arc<dyn VideoFileStore>,
    ) -> Self {
        Self {
            manager,
            storages,
            files,
        }
    }

    /// Files whose remote copy lives on `storage`.
    pub async fn storage_stats(&self, storage: &Storage) -> AppResult<StorageFileStats> {
        let files = self.files.find_video_files_by_storage(storage.id).await?;
        Ok(StorageFileStats::from_files(&files))
    }

    /// Files with no storage reference.
    pub async fn local_storage_stats(&self) -> AppResult<StorageFileStats> {
        let files = self.files.find_video_files_without_storage().await?;
        Ok(StorageFileStats::from_files(&files))
    }

    /// Local disk first, then every configured storage by id.
    pub async fn all_storages_stats(&self) -> AppResult<Vec<StorageStatsEntry>> {
        let mut entries = vec![StorageStatsEntry {
            id: None,
            name: LOCAL_STORAGE_NAME.to_string(),
            storage_type: StorageType::Local,
            is_enabled: true,
            is_default: false,
            stats: self.local_storage_stats().await?,
            quota: None,
            usage_percent: None,
            warning: false,
        }];

        for storage in self.storages.find_all_storages().await? {
            let stats = self.storage_stats(&storage).await?;
            let quota = self.manager.storage_quota(&storage).await;
            entries.push(StorageStatsEntry {
                id: Some(storage.id),
                name: storage.name,
                storage_type: storage.storage_type,
                is_enabled: storage.is_enabled,
                is_default: storage.is_default,
                stats,
                usage_percent: quota.and_then(|q| q.usage_percent()),
                warning: is_warning_threshold_exceeded(quota.as_ref()),
                quota,
            });
        }
        Ok(entries)
    }

    /// Sums over every entry of [`StorageStatsService::all_storages_stats`].
    pub async fn total_stats(&self) -> AppResult<TotalStats> {
        let entries = self.all_storages_stats().await?;
        Ok(entries.iter().fold(
            TotalStats::default(),
            |acc, entry| TotalStats {
                files_count: acc.files_count + entry.stats.files_count,
                total_size: acc.total_size.saturating_add(entry.stats.total_size),
                storages_count: acc.storages_count + 1,
            },
        ))
    }
}

/// Whether usage is at or above the warning threshold. Unknown quotas never warn.
pub fn is_warning_threshold_exceeded(quota: Option<&StorageQuota>) -> bool {
    quota.is_some_and(StorageQuota::is_warning_threshold_exceeded)
}

/// Entries whose usage is at or above the threshold.
pub fn storages_with_warning(entries: &[StorageStatsEntry]) -> Vec<StorageWarning> {
    entries
        .iter()
        .filter_map(|entry| {
            let percent = entry.quota.as_ref()?.usage_percent()?;
            (percent >= WARNING_THRESHOLD_PERCENT).then(|| StorageWarning {
                name: entry.name.clone(),
                usage_percent: percent,
            })
        })
        .collect()
}

/// Human readable size with two decimals (`B`, `KB`, `MB`, `GB`, `TB`).
pub fn format_size(bytes: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes <= 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.2} {}", UNITS[unit])
}
