//! Migration progress reports kept in the cache.
//!
//! The base record is written once; counters are separate keys bumped with
//! atomic `incr`, so concurrent jobs never overwrite each other's results.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use mediahub_cache::{CacheManager, keys};
use mediahub_core::result::AppResult;
use mediahub_core::traits::cache::CacheProvider;
use mediahub_core::types::VideoFileId;
use mediahub_entity::migration::{MigrationFailure, MigrationReport, MigrationSummary};

/// How long report entries live in the cache.
pub const REPORT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default size of the recently completed list.
pub const RECENT_COMPLETED_LIMIT: usize = 10;

/// Creates, updates and summarizes migration reports.
#[derive(Debug, Clone)]
pub struct MigrationReportService {
    cache: CacheManager,
    /// Serializes read-modify-write of the failure list and the index.
    write_lock: Arc<Mutex<()>>,
}

impl MigrationReportService {
    /// Create a report service over the given cache.
    pub fn new(cache: CacheManager) -> Self {
        Self {
            cache,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Fresh migration id (`migration_<uuid>`).
    pub fn generate_migration_id() -> String {
        format!("migration_{}", Uuid::new_v4().simple())
    }

    /// Store a new report and add it to the index.
    pub async fn create_report(
        &self,
        migration_id: &str,
        total_files: u64,
        source_name: &str,
        destination_name: &str,
    ) -> AppResult<MigrationReport> {
        let report = MigrationReport::new(migration_id, total_files, source_name, destination_name);
        self.cache
            .set_json(&keys::migration_report(migration_id), &report, REPORT_TTL)
            .await?;

        let _guard = self.write_lock.lock().await;
        let mut index = self.index().await?;
        if !index.iter().any(|id| id == migration_id) {
            index.push(migration_id.to_string());
            self.cache
                .set_json(&keys::migration_index(), &index, REPORT_TTL)
                .await?;
        }

        info!(
            migration_id,
            total_files,
            source = source_name,
            destination = destination_name,
            "Migration report created"
        );
        Ok(report)
    }

    /// Count one migrated file.
    pub async fn record_success(&self, migration_id: &str, file_id: VideoFileId) -> AppResult<()> {
        let Some(base) = self.base_report(migration_id).await? else {
            warn!(migration_id, %file_id, "Migration report not found for success recording");
            return Ok(());
        };
        let success = self
            .cache
            .incr(&keys::migration_success_count(migration_id), REPORT_TTL)
            .await?;
        debug!(migration_id, %file_id, success_count = success, "Migration success recorded");
        self.mark_completed_if_done(&base).await
    }

    /// Count one failed file and keep its error.
    pub async fn record_failure(
        &self,
        migration_id: &str,
        file_id: VideoFileId,
        error: &str,
    ) -> AppResult<()> {
        let Some(base) = self.base_report(migration_id).await? else {
            warn!(migration_id, %file_id, "Migration report not found for failure recording");
            return Ok(());
        };

        {
            let _guard = self.write_lock.lock().await;
            let key = keys::migration_failures(migration_id);
            let mut failures: Vec<MigrationFailure> =
                self.cache.get_json(&key).await?.unwrap_or_default();
            failures.push(MigrationFailure {
                file_id,
                error: error.to_string(),
                timestamp: Utc::now(),
            });
            self.cache.set_json(&key, &failures, REPORT_TTL).await?;
        }

        let failed = self
            .cache
            .incr(&keys::migration_failure_count(migration_id), REPORT_TTL)
            .await?;
        debug!(migration_id, %file_id, failure_count = failed, error, "Migration failure recorded");
        self.mark_completed_if_done(&base).await
    }

    /// Full report with live counters, or `None` if unknown or expired.
    pub async fn report(&self, migration_id: &str) -> AppResult<Option<MigrationReport>> {
        let Some(mut report) = self.base_report(migration_id).await? else {
            return Ok(None);
        };
        report.success_count = self
            .counter(&keys::migration_success_count(migration_id))
            .await?;
        report.failure_count = self
            .counter(&keys::migration_failure_count(migration_id))
            .await?;
        report.failures = self.failures(migration_id).await?;
        report.completed_at = self
            .cache
            .get(&keys::migration_completed_at(migration_id))
            .await?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|at| at.with_timezone(&Utc));
        Ok(Some(report))
    }

    /// Summary view; `found = false` for unknown ids.
    pub async fn summary(&self, migration_id: &str) -> AppResult<MigrationSummary> {
        Ok(match self.report(migration_id).await? {
            Some(report) => report.summary(),
            None => MigrationSummary::not_found(migration_id),
        })
    }

    /// Per-file failures of a migration, oldest first.
    pub async fn failures(&self, migration_id: &str) -> AppResult<Vec<MigrationFailure>> {
        Ok(self
            .cache
            .get_json(&keys::migration_failures(migration_id))
            .await?
            .unwrap_or_default())
    }

    /// Summaries of migrations that still have outstanding files.
    pub async fn active_migrations(&self) -> AppResult<Vec<MigrationSummary>> {
        let mut active = Vec::new();
        for report in self.indexed_reports().await? {
            if !report.is_complete() {
                active.push(report.summary());
            }
        }
        Ok(active)
    }

    /// Most recently completed migrations, newest first.
    pub async fn recent_completed_migrations(
        &self,
        limit: usize,
    ) -> AppResult<Vec<MigrationSummary>> {
        let mut completed: Vec<MigrationSummary> = self
            .indexed_reports()
            .await?
            .into_iter()
            .filter(MigrationReport::is_complete)
            .map(|report| report.summary())
            .collect();
        completed.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        completed.truncate(limit);
        Ok(completed)
    }

    /// Remove a report and all of its keys.
    pub async fn delete_report(&self, migration_id: &str) -> AppResult<()> {
        for key in [
            keys::migration_report(migration_id),
            keys::migration_success_count(migration_id),
            keys::migration_failure_count(migration_id),
            keys::migration_failures(migration_id),
            keys::migration_completed_at(migration_id),
        ] {
            self.cache.delete(&key).await?;
        }

        let _guard = self.write_lock.lock().await;
        let mut index = self.index().await?;
        index.retain(|id| id != migration_id);
        self.cache
            .set_json(&keys::migration_index(), &index, REPORT_TTL)
            .await?;

        info!(migration_id, "Migration report deleted");
        Ok(())
    }

    async fn base_report(&self, migration_id: &str) -> AppResult<Option<MigrationReport>> {
        self.cache.get_json(&keys::migration_report(migration_id)).await
    }

    async fn counter(&self, key: &str) -> AppResult<u64> {
        Ok(self
            .cache
            .get(key)
            .await?
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(0))
    }

    async fn index(&self) -> AppResult<Vec<String>> {
        Ok(self
            .cache
            .get_json(&keys::migration_index())
            .await?
            .unwrap_or_default())
    }

    async fn indexed_reports(&self) -> AppResult<Vec<MigrationReport>> {
        let mut reports = Vec::new();
        for id in self.index().await? {
            if let Some(report) = self.report(&id).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    async fn mark_completed_if_done(&self, base: &MigrationReport) -> AppResult<()> {
        let id = base.id.as_str();
        let processed = self.counter(&keys::migration_success_count(id)).await?
            + self.counter(&keys::migration_failure_count(id)).await?;
        if base.total_files == 0 || processed < base.total_files {
            return Ok(());
        }
        let first = self
            .cache
            .set_nx(
                &keys::migration_completed_at(id),
                &Utc::now().to_rfc3339(),
                REPORT_TTL,
            )
            .await?;
        if first {
            info!(migration_id = id, total_files = base.total_files, "Migration completed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_entity::migration::MigrationStatus;

    fn service() -> MigrationReportService {
        MigrationReportService::new(CacheManager::in_memory())
    }

    #[tokio::test]
    async fn test_counts_match_recorded_outcomes() {
        let reports = service();
        let id = MigrationReportService::generate_migration_id();
        reports.create_report(&id, 3, "ftp-a", "Local storage").await.unwrap();

        reports.record_success(&id, VideoFileId::new(1)).await.unwrap();
        reports
            .record_failure(&id, VideoFileId::new(2), "timeout")
            .await
            .unwrap();
        let summary = reports.summary(&id).await.unwrap();
        assert_eq!(summary.status, Some(MigrationStatus::InProgress));
        assert_eq!(summary.processed_count, 2);
        assert!(summary.completed_at.is_none());

        reports.record_success(&id, VideoFileId::new(3)).await.unwrap();
        let summary = reports.summary(&id).await.unwrap();
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.is_complete);
        assert!(summary.completed_at.is_some());

        let failures = reports.failures(&id).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].file_id, VideoFileId::new(2));
        assert_eq!(failures[0].error, "timeout");
    }

    #[tokio::test]
    async fn test_concurrent_results_are_not_lost() {
        let reports = service();
        let id = MigrationReportService::generate_migration_id();
        reports.create_report(&id, 40, "a", "b").await.unwrap();

        let mut handles = Vec::new();
        for n in 0..40 {
            let reports = reports.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                let file = VideoFileId::new(n);
                if n % 4 == 0 {
                    reports.record_failure(&id, file, "boom").await
                } else {
                    reports.record_success(&id, file).await
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let summary = reports.summary(&id).await.unwrap();
        assert_eq!(summary.success_count, 30);
        assert_eq!(summary.failure_count, 10);
        assert_eq!(reports.failures(&id).await.unwrap().len(), 10);
        assert!(summary.is_complete);
    }

    #[tokio::test]
    async fn test_unknown_report() {
        let reports = service();
        assert!(!reports.summary("migration_nope").await.unwrap().found);
        reports
            .record_success("migration_nope", VideoFileId::new(1))
            .await
            .unwrap();
        assert!(reports.report("migration_nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_active_and_completed_listings() {
        let reports = service();
        reports.create_report("migration_a", 1, "a", "b").await.unwrap();
        reports.create_report("migration_b", 2, "a", "b").await.unwrap();
        reports
            .record_success("migration_a", VideoFileId::new(1))
            .await
            .unwrap();

        let active = reports.active_migrations().await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].migration_id, "migration_b");

        let done = reports
            .recent_completed_migrations(RECENT_COMPLETED_LIMIT)
            .await
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].migration_id, "migration_a");

        reports.delete_report("migration_a").await.unwrap();
        assert!(reports.recent_completed_migrations(10).await.unwrap().is_empty());
        assert!(!reports.summary("migration_a").await.unwrap().found);
    }
}
