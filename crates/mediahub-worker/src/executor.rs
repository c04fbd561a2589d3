//! Job executor: dispatches jobs to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use mediahub_core::error::AppError;
use mediahub_entity::job::JobMessage;

/// A handler for one job type.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Job type this handler processes (see [`JobMessage::job_type`]).
    fn job_type(&self) -> &str;

    /// Execute one job.
    async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Failed for good; nothing will retry it.
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Failed this attempt; a retry has been queued.
    #[error("Transient job failure: {0}")]
    Transient(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Dispatches jobs to the handler registered for their type.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler, replacing any previous one for the same type.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        info!(job_type = %job_type, "Registered job handler");
        self.handlers.insert(job_type, handler);
    }

    /// Run a job on its handler.
    pub async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
        let handler = self.handlers.get(job.job_type()).ok_or_else(|| {
            JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                job.job_type()
            ))
        })?;
        debug!(job_type = job.job_type(), attempt = job.attempt(), "Executing job");
        handler.execute(job).await
    }

    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered job types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_core::types::StorageId;
    use mediahub_entity::job::DeleteFromStorageMessage;

    #[derive(Debug)]
    struct Echo;

    #[async_trait]
    impl JobHandler for Echo {
        fn job_type(&self) -> &str {
            "delete_from_storage"
        }

        async fn execute(&self, job: &JobMessage) -> Result<Option<Value>, JobExecutionError> {
            Ok(Some(Value::from(job.attempt())))
        }
    }

    #[tokio::test]
    async fn test_routes_by_job_type() {
        let mut executor = JobExecutor::new();
        executor.register(Arc::new(Echo));
        assert!(executor.has_handler("delete_from_storage"));
        assert_eq!(executor.registered_types(), vec!["delete_from_storage"]);

        let job = DeleteFromStorageMessage::new(StorageId::new(1), "a").retry().into();
        assert_eq!(executor.execute(&job).await.unwrap(), Some(Value::from(2)));
    }

    #[tokio::test]
    async fn test_unknown_type_is_permanent() {
        let executor = JobExecutor::new();
        let job = DeleteFromStorageMessage::new(StorageId::new(1), "a").into();
        let err = executor.execute(&job).await.unwrap_err();
        assert!(matches!(err, JobExecutionError::Permanent(msg) if msg.contains("delete_from_storage")));
    }
}
