//! # mediahub-service
//!
//! Service layer over the storage core. Services take their collaborators
//! (storage manager, catalog stores, job dispatcher, cache) as `Arc`s at
//! construction time.

pub mod storage;

pub use storage::{DeletionService, MigrationReportService, MigrationService, StorageStatsService};
