//! Migration report aggregate and its summary view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use mediahub_core::types::VideoFileId;

/// Lifecycle status of a migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    /// Some jobs have not reported yet.
    InProgress,
    /// Every job reported success or failure.
    Completed,
}

impl MigrationStatus {
    /// Return the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One file that could not be migrated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationFailure {
    /// Rendition that failed.
    pub file_id: VideoFileId,
    /// Error text from the last attempt.
    pub error: String,
    /// When the failure was recorded.
    pub timestamp: DateTime<Utc>,
}

/// State of one migration run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    /// Generated migration id (`migration_<uuid>`).
    pub id: String,
    /// Number of files the run was started with.
    pub total_files: u64,
    /// Files migrated successfully.
    pub success_count: u64,
    /// Files that failed after all attempts.
    pub failure_count: u64,
    /// Per-file failure records.
    pub failures: Vec<MigrationFailure>,
    /// Display name of the source storage.
    pub source_storage_name: String,
    /// Display name of the destination storage.
    pub destination_storage_name: String,
    /// When the run was created.
    pub started_at: DateTime<Utc>,
    /// When the last job reported.
    pub completed_at: Option<DateTime<Utc>>,
}

impl MigrationReport {
    /// Fresh report with no results yet.
    pub fn new(
        id: impl Into<String>,
        total_files: u64,
        source_storage_name: impl Into<String>,
        destination_storage_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            total_files,
            success_count: 0,
            failure_count: 0,
            failures: Vec::new(),
            source_storage_name: source_storage_name.into(),
            destination_storage_name: destination_storage_name.into(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Files that have reported either way.
    pub fn processed_count(&self) -> u64 {
        self.success_count + self.failure_count
    }

    /// Files still outstanding.
    pub fn remaining_count(&self) -> u64 {
        self.total_files.saturating_sub(self.processed_count())
    }

    /// Whether every file has reported.
    pub fn is_complete(&self) -> bool {
        self.total_files > 0 && self.processed_count() >= self.total_files
    }

    /// Current status derived from the counters.
    pub fn status(&self) -> MigrationStatus {
        if self.is_complete() {
            MigrationStatus::Completed
        } else {
            MigrationStatus::InProgress
        }
    }

    /// Processed share of the total, rounded to one decimal.
    pub fn progress_percent(&self) -> f64 {
        if self.total_files == 0 {
            return 0.0;
        }
        let percent = self.processed_count() as f64 / self.total_files as f64 * 100.0;
        (percent * 10.0).round() / 10.0
    }

    /// Whether any file failed.
    pub fn has_failures(&self) -> bool {
        self.failure_count > 0
    }

    /// Flattened view for status endpoints and logs.
    pub fn summary(&self) -> MigrationSummary {
        MigrationSummary {
            found: true,
            migration_id: self.id.clone(),
            status: Some(self.status()),
            total_files: self.total_files,
            success_count: self.success_count,
            failure_count: self.failure_count,
            processed_count: self.processed_count(),
            remaining_count: self.remaining_count(),
            progress_percent: self.progress_percent(),
            source_storage_name: Some(self.source_storage_name.clone()),
            destination_storage_name: Some(self.destination_storage_name.clone()),
            started_at: Some(self.started_at),
            completed_at: self.completed_at,
            is_complete: self.is_complete(),
            has_failures: self.has_failures(),
        }
    }
}

/// Summary of a migration run; `found = false` for unknown ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationSummary {
    /// Whether the report exists.
    pub found: bool,
    /// Requested migration id.
    pub migration_id: String,
    /// Status, when found.
    pub status: Option<MigrationStatus>,
    /// Total files.
    pub total_files: u64,
    /// Successful files.
    pub success_count: u64,
    /// Failed files.
    pub failure_count: u64,
    /// `success_count + failure_count`.
    pub processed_count: u64,
    /// `total_files - processed_count`.
    pub remaining_count: u64,
    /// Processed share, one decimal.
    pub progress_percent: f64,
    /// Source storage name.
    pub source_storage_name: Option<String>,
    /// Destination storage name.
    pub destination_storage_name: Option<String>,
    /// Start time.
    pub started_at: Option<DateTime<Utc>>,
    /// Completion time.
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether every file reported.
    pub is_complete: bool,
    /// Whether any file failed.
    pub has_failures: bool,
}

impl MigrationSummary {
    /// Summary for an unknown or expired migration id.
    pub fn not_found(migration_id: impl Into<String>) -> Self {
        Self {
            found: false,
            migration_id: migration_id.into(),
            status: None,
            total_files: 0,
            success_count: 0,
            failure_count: 0,
            processed_count: 0,
            remaining_count: 0,
            progress_percent: 0.0,
            source_storage_name: None,
            destination_storage_name: None,
            started_at: None,
            completed_at: None,
            is_complete: false,
            has_failures: false,
        }
    }
}
