//! SFTP backend configuration.

use std::time::Duration;

use opendal::Operator;
use opendal::layers::{LoggingLayer, TimeoutLayer};
use opendal::services::Sftp;
use serde_json::{Map, Value};

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::storage::Storage;

use super::operator::opendal_error;
use super::{config_port, config_timeout};

const DEFAULT_PORT: u16 = 22;
const DEFAULT_TIMEOUT_SECONDS: i64 = 30;

/// How the SFTP client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SftpAuth {
    /// Private key file on this host.
    Key {
        /// Path to the key file.
        private_key: String,
    },
    /// Password login.
    Password {
        /// The password.
        password: String,
    },
}

/// Connection settings of an SFTP storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SftpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub auth: SftpAuth,
    pub base_path: String,
    pub timeout: Duration,
}

impl SftpConfig {
    /// Read the settings from a storage record.
    pub fn from_storage(storage: &Storage) -> AppResult<Self> {
        let required = |key: &str| {
            storage
                .config_str_non_blank(key)
                .ok_or_else(|| AppError::configuration(format!("SFTP storage requires \"{key}\"")))
        };
        let auth = match required("authType")?.to_lowercase().as_str() {
            "key" => SftpAuth::Key {
                private_key: required("privateKey")?,
            },
            "password" => SftpAuth::Password {
                password: required("password")?,
            },
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown SFTP authType \"{other}\" (expected key or password)"
                )));
            }
        };
        Ok(Self {
            host: required("host")?,
            port: config_port(storage, DEFAULT_PORT)?,
            username: required("username")?,
            auth,
            base_path: required("basePath")?,
            timeout: config_timeout(storage, DEFAULT_TIMEOUT_SECONDS)?,
        })
    }

    /// SSH endpoint.
    pub fn endpoint(&self) -> String {
        format!("ssh://{}:{}", self.host, self.port)
    }

    /// Build an operator rooted at `basePath` for a key login.
    ///
    /// Password logins go through [`SshSftpAdapter`](super::ssh::SshSftpAdapter)
    /// instead, since the operator's SSH client cannot answer a password prompt.
    pub fn operator(&self) -> AppResult<Operator> {
        let SftpAuth::Key { private_key } = &self.auth else {
            return Err(AppError::configuration(
                "The SFTP operator requires authType \"key\"",
            ));
        };

        let mut builder = Sftp::default();
        builder = builder
            .endpoint(&self.endpoint())
            .user(&self.username)
            .key(private_key)
            .root(&self.base_path);

        Ok(Operator::new(builder)
            .map_err(|e| opendal_error("Failed to configure SFTP client", e))?
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
        Storage::new(StorageId::new(2), "sftp", StorageType::Sftp, config)
    }

    #[test]
    fn test_key_auth_config() {
        let config = SftpConfig::from_storage(&storage(json!({
            "host": "sftp.example.com",
            "username": "media",
            "authType": "key",
            "privateKey": "/etc/mediahub/id_ed25519",
            "basePath": "/srv/media"
        })))
        .unwrap();
        assert_eq!(config.port, 22);
        assert_eq!(config.endpoint(), "ssh://sftp.example.com:22");
        assert_eq!(
            config.auth,
            SftpAuth::Key {
                private_key: "/etc/mediahub/id_ed25519".into()
            }
        );
    }

    #[test]
    fn test_password_auth_config() {
        let config = SftpConfig::from_storage(&storage(json!({
            "host": "sftp.example.com",
            "port": 2222,
            "username": "media",
            "authType": "Password",
            "password": "pw",
            "basePath": "/srv/media"
        })))
        .unwrap();
        assert_eq!(config.endpoint(), "ssh://sftp.example.com:2222");
        assert_eq!(config.auth, SftpAuth::Password { password: "pw".into() });
        assert!(config.operator().unwrap_err().is_configuration());
    }
}
