//! Storage backend type enumeration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The type of storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "storage_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Local filesystem.
    Local,
    /// FTP / FTPS server.
    Ftp,
    /// SFTP (SSH) server.
    Sftp,
    /// HTTP object storage exposing upload/delete endpoints.
    Http,
}

impl StorageType {
    /// Every supported backend type.
    pub const ALL: [StorageType; 4] = [Self::Local, Self::Ftp, Self::Sftp, Self::Http];

    /// Return the type as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ftp => "ftp",
            Self::Sftp => "sftp",
            Self::Http => "http",
        }
    }

    /// Whether files on this backend must be served through the proxy
    /// endpoint because browsers cannot reach the protocol directly.
    pub fn is_proxied(&self) -> bool {
        matches!(self, Self::Ftp | Self::Sftp)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for StorageType {
    type Err = mediahub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "ftp" => Ok(Self::Ftp),
            "sftp" => Ok(Self::Sftp),
            "http" => Ok(Self::Http),
            _ => Err(mediahub_core::AppError::configuration(format!(
                "Invalid storage type: '{s}'. Expected one of: local, ftp, sftp, http"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("SFTP".parse::<StorageType>().unwrap(), StorageType::Sftp);
        assert_eq!(" http ".parse::<StorageType>().unwrap(), StorageType::Http);
    }

    #[test]
    fn test_unknown_type_is_configuration_error() {
        let err = "s3".parse::<StorageType>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.message.contains("s3"));
    }

    #[test]
    fn test_only_ftp_and_sftp_are_proxied() {
        let proxied: Vec<_> = StorageType::ALL
            .iter()
            .filter(|t| t.is_proxied())
            .collect();
        assert_eq!(proxied, vec![&StorageType::Ftp, &StorageType::Sftp]);
    }
}
