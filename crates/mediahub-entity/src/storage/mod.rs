//! Storage domain entities.

pub mod kind;
pub mod model;
pub mod quota;
pub mod result;
pub mod store;

pub use kind::StorageType;
pub use model::Storage;
pub use quota::{StorageQuota, WARNING_THRESHOLD_PERCENT};
pub use result::{ConnectionTestResult, UploadResult};
pub use store::StorageStore;
