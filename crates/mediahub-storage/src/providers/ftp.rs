//! FTP/FTPS backend configuration.

use std::time::Duration;

use opendal::Operator;
use opendal::layers::{LoggingLayer, TimeoutLayer};
use opendal::services::Ftp;
use serde_json::{Map, Value};

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::storage::Storage;

use super::{config_port, config_timeout};
use super::operator::opendal_error;

const DEFAULT_PORT: u16 = 21;
const DEFAULT_TIMEOUT_SECONDS: i64 = 30;

/// Connection settings of an FTP storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FtpConfig {
    /// Server host name.
    pub host: String,
    /// Control port.
    pub port: u16,
    /// Login user.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Directory all remote paths are relative to.
    pub base_path: String,
    /// Use explicit TLS (`ftps://`).
    pub ssl: bool,
    /// Per-operation timeout.
    pub timeout: Duration,
}

impl FtpConfig {
    /// Read the settings from a storage record.
    pub fn from_storage(storage: &Storage) -> AppResult<Self> {
        let required = |key: &str| {
            storage
                .config_str_non_blank(key)
                .ok_or_else(|| AppError::configuration(format!("FTP storage requires \"{key}\"")))
        };
        Ok(Self {
            host: required("host")?,
            port: config_port(storage, DEFAULT_PORT)?,
            username: required("username")?,
            password: required("password")?,
            base_path: required("basePath")?,
            ssl: storage.config_bool("ssl").unwrap_or(false),
            timeout: config_timeout(storage, DEFAULT_TIMEOUT_SECONDS)?,
        })
    }

    /// Server endpoint URL.
    pub fn endpoint(&self) -> String {
        let scheme = if self.ssl { "ftps" } else { "ftp" };
        format!("{scheme}://{}:{}", self.host, self.port)
    }

    /// Build an operator rooted at `basePath`.
    pub fn operator(&self) -> AppResult<Operator> {
        let mut builder = Ftp::default();
        builder = builder
            .endpoint(&self.endpoint())
            .user(&self.username)
            .password(&self.password)
            .root(&self.base_path);

        Ok(Operator::new(builder)
            .map_err(|e| opendal_error("Failed to configure FTP client", e))?
            .layer(TimeoutLayer::new().with_timeout(self.timeout))
            .layer(LoggingLayer::default())
            .finish())
    }

    /// Details reported by the connection test.
    pub fn server_info(&self) -> Map<String, Value> {
        let mut info = Map::new();
        info.insert("host".into(), Value::String(self.host.clone()));
        info.insert("port".into(), Value::from(self.port));
        info.insert("basePath".into(), Value::String(self.base_path.clone()));
        info.insert("ssl".into(), Value::Bool(self.ssl));
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediahub_core::types::StorageId;
    use mediahub_entity::storage::StorageType;
    use serde_json::json;

    fn storage(config: Value) -> Storage {
        Storage::new(StorageId::new(1), "ftp", StorageType::Ftp, config)
    }

    #[test]
    fn test_defaults_and_scheme() {
        let config = FtpConfig::from_storage(&storage(json!({
            "host": "ftp.example.com",
            "username": "u",
            "password": "p",
            "basePath": "/media"
        })))
        .unwrap();
        assert_eq!(config.port, 21);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.endpoint(), "ftp://ftp.example.com:21");

        let tls = FtpConfig::from_storage(&storage(json!({
            "host": "ftp.example.com",
            "port": "2121",
            "username": "u",
            "password": "p",
            "basePath": "/media",
            "ssl": true
        })))
        .unwrap();
        assert_eq!(tls.endpoint(), "ftps://ftp.example.com:2121");
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let base = json!({ "host": "h", "username": "u", "password": "p", "basePath": "/" });
        for (key, value) in [("port", json!(70000)), ("timeout", json!(0)), ("timeout", json!(-5))] {
            let mut config = base.clone();
            config[key] = value;
            let err = FtpConfig::from_storage(&storage(config)).unwrap_err();
            assert!(err.is_configuration(), "{key}");
        }
        let err = FtpConfig::from_storage(&storage(json!({ "host": "h" }))).unwrap_err();
        assert!(err.is_configuration());
    }
}
