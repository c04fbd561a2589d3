//! Background job messages and the dispatch collaborator.

pub mod dispatch;
pub mod payload;

pub use dispatch::JobDispatcher;
pub use payload::{
    DeleteFromStorageMessage, JobMessage, MAX_ATTEMPTS, MigrateFileMessage, UploadToStorageMessage,
};
