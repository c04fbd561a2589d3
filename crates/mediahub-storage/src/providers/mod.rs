//! Storage adapter implementations.

pub mod ftp;
pub mod http;
pub mod local;
pub mod operator;
pub mod sftp;
pub mod ssh;

use std::time::Duration;

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::storage::Storage;

pub use ftp::FtpConfig;
pub use http::{HttpConfig, HttpStorageAdapter};
pub use local::LocalStorageAdapter;
pub use operator::OperatorAdapter;
pub use sftp::{SftpAuth, SftpConfig};
pub use ssh::SshSftpAdapter;

use crate::validation::is_valid_port;

/// `port` from the storage config, or `default` when absent.
pub(crate) fn config_port(storage: &Storage, default: u16) -> AppResult<u16> {
    match storage.config_value("port") {
        None => Ok(default),
        Some(_) => storage
            .config_i64("port")
            .filter(|p| is_valid_port(*p))
            .and_then(|p| u16::try_from(p).ok())
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "Storage \"{}\" has an invalid port (expected 1-65535)",
                    storage.name
                ))
            }),
    }
}

/// `timeout` (seconds) from the storage config, or `default` when absent.
pub(crate) fn config_timeout(storage: &Storage, default_seconds: i64) -> AppResult<Duration> {
    let seconds = match storage.config_value("timeout") {
        None => default_seconds,
        Some(_) => storage.config_i64("timeout").unwrap_or(0),
    };
    u64::try_from(seconds)
        .ok()
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
        .ok_or_else(|| {
            AppError::configuration(format!(
                "Storage \"{}\" has an invalid timeout (must be a positive number of seconds)",
                storage.name
            ))
        })
}
