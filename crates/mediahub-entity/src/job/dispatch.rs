//! Job dispatch collaborator.

use async_trait::async_trait;

use mediahub_core::result::AppResult;

use super::payload::JobMessage;

/// Fire-and-forget job submission.
///
/// Delivery is at-least-once; handlers must tolerate duplicates.
#[async_trait]
pub trait JobDispatcher: Send + Sync + std::fmt::Debug + 'static {
    /// Hand a job to the queue.
    async fn enqueue(&self, job: JobMessage) -> AppResult<()>;
}
