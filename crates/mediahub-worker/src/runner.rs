//! Worker runner: drains the job queue and executes jobs concurrently.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tracing::{error, info, warn};

use mediahub_core::config::WorkerConfig;
use mediahub_entity::job::JobMessage;

use crate::executor::{JobExecutionError, JobExecutor};
use crate::queue::JobReceiver;

/// Runs jobs from the queue with bounded concurrency.
#[derive(Debug)]
pub struct WorkerRunner {
    executor: Arc<JobExecutor>,
    config: WorkerConfig,
}

impl WorkerRunner {
    pub fn new(executor: Arc<JobExecutor>, config: WorkerConfig) -> Self {
        Self { executor, config }
    }

    /// Process jobs until the cancel signal fires or every sender is dropped,
    /// then wait (bounded by the shutdown timeout) for in-flight jobs.
    pub async fn run(&self, mut jobs: JobReceiver, mut cancel: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency.max(1);
        info!(
            concurrency,
            handlers = ?self.executor.registered_types(),
            "Worker started"
        );

        let semaphore = Arc::new(Semaphore::new(concurrency));

        loop {
            let job = tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        info!("Worker received shutdown signal");
                        break;
                    }
                    continue;
                }
                job = jobs.recv() => match job {
                    Some(job) => job,
                    None => {
                        info!("Job queue closed");
                        break;
                    }
                },
            };

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                let _permit = permit;
                Self::process(&executor, job).await;
            });
        }

        info!("Waiting for in-flight jobs to complete");
        let timeout = Duration::from_secs(self.config.shutdown_timeout_seconds);
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        if tokio::time::timeout(timeout, semaphore.acquire_many(permits))
            .await
            .is_err()
        {
            warn!("Shutdown timeout reached with jobs still running");
        }
        info!("Worker shut down");
    }

    async fn process(executor: &JobExecutor, job: JobMessage) {
        let job_type = job.job_type();
        let attempt = job.attempt();
        match executor.execute(&job).await {
            Ok(_) => info!(job_type, attempt, "Job completed"),
            Err(JobExecutionError::Transient(msg)) => {
                warn!(job_type, attempt, error = %msg, "Job attempt failed, retry queued");
            }
            Err(JobExecutionError::Permanent(msg)) => {
                error!(job_type, attempt, error = %msg, "Job failed permanently");
            }
            Err(JobExecutionError::Internal(err)) => {
                error!(job_type, attempt, error = %err, "Job internal error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;
    use crate::executor::JobHandler;
    use crate::queue::JobQueue;
    use mediahub_core::types::StorageId;
    use mediahub_entity::job::{DeleteFromStorageMessage, JobDispatcher};

    #[derive(Debug, Default)]
    struct Counting {
        seen: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler for Counting {
        fn job_type(&self) -> &str {
            "delete_from_storage"
        }

        async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            match job {
                JobMessage::DeleteFromStorage(m) if m.remote_path == "bad" => {
                    Err(JobExecutionError::Permanent("bad path".into()))
                }
                _ => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn test_drains_queue_and_survives_failures() {
        let handler = Arc::new(Counting::default());
        let mut executor = JobExecutor::new();
        executor.register(handler.clone());
        let runner = WorkerRunner::new(Arc::new(executor), WorkerConfig::default());

        let (queue, receiver) = JobQueue::new(16);
        for path in ["a", "bad", "c"] {
            queue
                .enqueue(DeleteFromStorageMessage::new(StorageId::new(1), path).into())
                .await
                .unwrap();
        }
        drop(queue);

        let (_cancel_tx, cancel_rx) = watch::channel(false);
        runner.run(receiver, cancel_rx).await;
        assert_eq!(handler.seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_on_cancel() {
        let runner = WorkerRunner::new(Arc::new(JobExecutor::new()), WorkerConfig::default());
        let (_queue, receiver) = JobQueue::new(4);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(async move { runner.run(receiver, cancel_rx).await });
        cancel_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
