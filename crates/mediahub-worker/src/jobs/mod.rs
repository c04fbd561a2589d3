//! Storage job handlers.

pub mod delete;
pub mod migrate;
pub mod upload;

use mediahub_entity::job::{JobDispatcher, JobMessage};

use crate::executor::JobExecutionError;

pub use delete::DeleteFromStorageJobHandler;
pub use migrate::MigrateFileJobHandler;
pub use upload::UploadToStorageJobHandler;

/// Queue the next attempt and report this one as transient.
async fn schedule_retry(
    dispatcher: &dyn JobDispatcher,
    next: JobMessage,
    reason: String,
) -> JobExecutionError {
    let next_attempt = next.attempt();
    match dispatcher.enqueue(next).await {
        Ok(()) => JobExecutionError::Transient(format!("{reason} (retry {next_attempt} queued)")),
        Err(e) => JobExecutionError::Internal(e),
    }
}

fn unexpected_payload(expected: &str, job: &JobMessage) -> JobExecutionError {
    JobExecutionError::Permanent(format!(
        "Expected a {expected} job, got {}",
        job.job_type()
    ))
}
