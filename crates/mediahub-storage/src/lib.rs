//! # mediahub-storage
//!
//! Storage adapters for MediaHub renditions (local disk, FTP, SFTP and HTTP
//! object stores), the adapter registry, signed proxy URLs and the storage
//! manager that ties them to the storage catalog.

pub mod adapter;
pub mod factory;
pub mod manager;
pub mod providers;
pub mod proxy;
pub mod retry;
pub mod signing;
pub mod validation;

pub use adapter::StorageAdapter;
pub use factory::{AdapterFactory, AdapterRegistry};
pub use manager::{BulkDeleteResult, StorageManager};
pub use proxy::ProxyDownload;
pub use retry::RetryExecutor;
pub use signing::SignedUrlService;
pub use validation::StorageConfigValidator;
