//! Background job processing for MediaHub.
//!
//! - [`queue::JobQueue`]: bounded in-process queue, the [`JobDispatcher`]
//!   the services enqueue into
//! - [`runner::WorkerRunner`]: drains the queue with bounded concurrency
//! - [`executor::JobExecutor`]: routes each job to its handler
//! - [`jobs`]: migration, deletion and upload handlers
//!
//! [`JobDispatcher`]: mediahub_entity::job::JobDispatcher

pub mod executor;
pub mod jobs;
pub mod queue;
pub mod runner;

pub use executor::{JobExecutionError, JobExecutor, JobHandler};
pub use queue::{JobQueue, JobReceiver};
pub use runner::WorkerRunner;
