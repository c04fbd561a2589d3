//! Storage configuration and remote path validation.

use std::collections::BTreeMap;

use mediahub_core::error::AppError;
use mediahub_core::result::AppResult;
use mediahub_entity::storage::{Storage, StorageType};

/// Field name → error message. Empty when the storage is valid.
pub type ValidationErrors = BTreeMap<String, String>;

/// Longest accepted storage name, in characters.
pub const MAX_NAME_LENGTH: usize = 100;

/// Longest accepted remote path, in bytes.
pub const MAX_PATH_LENGTH: usize = 255;

const RESERVED_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Checks storage records before any adapter is built.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageConfigValidator;

impl StorageConfigValidator {
    /// Configuration keys that must be present and non-blank for `storage_type`.
    pub fn required_fields(storage_type: StorageType) -> &'static [&'static str] {
        match storage_type {
            StorageType::Local => &[],
            StorageType::Ftp => &["host", "port", "username", "password", "basePath"],
            StorageType::Sftp => &["host", "port", "username", "authType", "basePath"],
            StorageType::Http => &["baseUrl", "authToken", "uploadEndpoint"],
        }
    }

    /// Validate the name and type-specific configuration of `storage`.
    pub fn validate(storage: &Storage) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        let name_len = storage.name.trim().chars().count();
        if name_len == 0 || name_len > MAX_NAME_LENGTH {
            errors.insert(
                "name".to_string(),
                format!("The name must be between 1 and {MAX_NAME_LENGTH} characters."),
            );
        }

        let mut config_errors = ValidationErrors::new();
        for field in Self::required_fields(storage.storage_type) {
            if storage.config_str_non_blank(field).is_none() {
                config_errors.insert(
                    (*field).to_string(),
                    format!("The {field} field is required."),
                );
            }
        }

        if matches!(storage.storage_type, StorageType::Ftp | StorageType::Sftp)
            && storage.config_str_non_blank("port").is_some()
            && !storage.config_i64("port").is_some_and(is_valid_port)
        {
            config_errors.insert(
                "port".to_string(),
                "The port must be between 1 and 65535.".to_string(),
            );
        }

        if storage.storage_type == StorageType::Http {
            if let Some(base_url) = storage.config_str_non_blank("baseUrl") {
                if !is_http_url(&base_url) {
                    config_errors.insert(
                        "baseUrl".to_string(),
                        "The baseUrl must be a valid http or https URL.".to_string(),
                    );
                }
            }
        }

        if storage.storage_type == StorageType::Sftp
            && let Some(auth_type) = storage.config_str_non_blank("authType")
        {
            let auth_type = auth_type.to_lowercase();
            let conditional = match auth_type.as_str() {
                "password" => Some("password"),
                "key" => Some("privateKey"),
                _ => {
                    config_errors.insert(
                        "authType".to_string(),
                        "The authType must be either key or password.".to_string(),
                    );
                    None
                }
            };
            if let Some(field) = conditional
                && storage.config_str_non_blank(field).is_none()
            {
                config_errors.insert(
                    field.to_string(),
                    format!("The {field} field is required when authType is {auth_type}."),
                );
            }
        }

        errors.extend(config_errors);
        errors
    }

    /// Whether `storage` passes validation.
    pub fn is_valid(storage: &Storage) -> bool {
        Self::validate(storage).is_empty()
    }

    /// Validate and turn any errors into a validation [`AppError`].
    pub fn validate_or_error(storage: &Storage) -> AppResult<()> {
        let errors = Self::validate(storage);
        if errors.is_empty() {
            return Ok(());
        }
        let details = errors
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect::<Vec<_>>()
            .join("; ");
        Err(AppError::validation(format!(
            "Invalid configuration for storage \"{}\": {details}",
            storage.name
        )))
    }
}

/// Validate before building an adapter; problems surface as configuration errors.
pub fn require_valid_config(storage: &Storage) -> AppResult<()> {
    StorageConfigValidator::validate_or_error(storage).map_err(|e| AppError::configuration(e.message))
}

/// Whether `port` is a usable TCP port.
pub fn is_valid_port(port: i64) -> bool {
    (1..=65535).contains(&port)
}

/// Whether `value` parses as an absolute http(s) URL with a host.
pub fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

/// Reject remote paths that could escape the storage root or break on some backends.
pub fn validate_remote_path(path: &str) -> AppResult<()> {
    let normalized = path.replace('\\', "/");

    if normalized.trim().is_empty() {
        return Err(AppError::validation("Remote path must not be empty"));
    }
    for pattern in ["..", "~", "//", "\0"] {
        if normalized.contains(pattern) {
            return Err(AppError::validation(format!(
                "Invalid path contains dangerous pattern: {}",
                pattern.escape_default()
            )));
        }
    }
    for segment in normalized.split('/') {
        let stem = segment.split('.').next().unwrap_or(segment);
        if RESERVED_NAMES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(stem))
        {
            return Err(AppError::validation(format!(
                "Invalid path contains reserved name: {segment}"
            )));
        }
    }
    if normalized.starts_with('/') {
        return Err(AppError::validation(format!(
            "Path should not start with /: {path}"
        )));
    }
    if path.len() > MAX_PATH_LENGTH {
        return Err(AppError::validation(format!(
            "Path is too long (max {MAX_PATH_LENGTH} characters): {path}"
        )));
    }
    Ok(())
}
