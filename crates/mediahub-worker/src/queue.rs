//! Bounded in-process job queue.

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::job::{JobDispatcher, JobMessage};

/// Receiving half drained by the [`WorkerRunner`](crate::runner::WorkerRunner).
pub type JobReceiver = mpsc::Receiver<JobMessage>;

/// Sending half of the job queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<JobMessage>,
}

impl JobQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn new(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Jobs waiting to be picked up.
    pub fn pending(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }
}

#[async_trait]
impl JobDispatcher for JobQueue {
    /// Never blocks: when the queue is full the job is handed to a task that
    /// waits for room, so handlers can re-enqueue while the runner is busy.
    async fn enqueue(&self, job: JobMessage) -> AppResult<()> {
        match self.sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) => {
                debug!(job_type = job.job_type(), "Job queue full, deferring enqueue");
                let sender = self.sender.clone();
                tokio::spawn(async move {
                    let job_type = job.job_type();
                    if sender.send(job).await.is_err() {
                        warn!(job_type, "Job queue closed before a deferred job was queued");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_)) => Err(AppError::internal("Job queue is closed")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_core::types::StorageId;
    use mediahub_entity::job::DeleteFromStorageMessage;

    fn job(path: &str) -> JobMessage {
        DeleteFromStorageMessage::new(StorageId::new(1), path).into()
    }

    #[tokio::test]
    async fn test_full_queue_defers_instead_of_failing() {
        let (queue, mut receiver) = JobQueue::new(1);
        queue.enqueue(job("a")).await.unwrap();
        queue.enqueue(job("b")).await.unwrap();
        assert_eq!(queue.pending(), 1);

        assert_eq!(receiver.recv().await, Some(job("a")));
        assert_eq!(receiver.recv().await, Some(job("b")));
    }

    #[tokio::test]
    async fn test_closed_queue_is_an_error() {
        let (queue, receiver) = JobQueue::new(4);
        drop(receiver);
        assert!(queue.enqueue(job("a")).await.is_err());
    }
}
