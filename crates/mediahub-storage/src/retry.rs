//! Bounded retry with exponential backoff for storage I/O.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;

/// Attempts made before giving up.
pub const MAX_ATTEMPTS: u32 = 3;

/// Suspends the current task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync + std::fmt::Debug + 'static {
    /// Wait for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays
            .lock()
            .map(|delays| delays.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
    }
}

/// Runs a fallible async operation up to [`MAX_ATTEMPTS`] times.
///
/// Attempt `k` that fails (with `k < MAX_ATTEMPTS`) is followed by a
/// `2^k` second pause, so the schedule is 2 s then 4 s.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    sleeper: Arc<dyn Sleeper>,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(Arc::new(TokioSleeper))
    }
}

impl RetryExecutor {
    /// Create an executor using the given sleeper.
    pub fn new(sleeper: Arc<dyn Sleeper>) -> Self {
        Self { sleeper }
    }

    /// Execute `operation`, retrying on error.
    pub async fn execute<T, F, Fut>(&self, operation_name: &str, mut operation: F) -> AppResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = AppResult<T>> + Send,
        T: Send,
    {
        let mut attempt = 1;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        error = %e,
                        "Storage operation failed, retrying"
                    );
                    self.sleeper.sleep(backoff_delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(AppError::with_source(
                        ErrorKind::Storage,
                        format!(
                            "Operation \"{operation_name}\" failed after {MAX_ATTEMPTS} attempts: {e}"
                        ),
                        e,
                    ));
                }
            }
        }
    }
}

/// Delay after failed attempt `attempt` (1-based).
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.pow(attempt))
}
