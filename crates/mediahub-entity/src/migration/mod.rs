//! Migration run tracking.

pub mod report;

pub use report::{MigrationFailure, MigrationReport, MigrationStatus, MigrationSummary};
