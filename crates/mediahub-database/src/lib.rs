//! # mediahub-database
//!
//! PostgreSQL connection management and the repositories backing the
//! `StorageStore` / `VideoFileStore` collaborators, plus an in-memory
//! catalog implementing the same traits for single-node runs and tests.

pub mod connection;
pub mod memory;
pub mod repositories;

pub use connection::DatabasePool;
pub use memory::InMemoryCatalog;
