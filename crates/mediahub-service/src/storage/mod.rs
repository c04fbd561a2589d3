//! Storage-level services: migrations, reports, deletion fan-out and statistics.

pub mod deletion;
pub mod migration;
pub mod report;
pub mod stats;

pub use deletion::{DeletionService, group_by_storage};
pub use migration::{LOCAL_STORAGE_NAME, MigrationService, local_path_for, remote_path_for};
pub use report::{MigrationReportService, RECENT_COMPLETED_LIMIT, REPORT_TTL};
pub use stats::{
    StorageFileStats, StorageStatsEntry, StorageStatsService, StorageWarning, TotalStats,
    format_size, is_warning_threshold_exceeded, storages_with_warning,
};
