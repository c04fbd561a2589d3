//! Storage entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use mediahub_core::types::StorageId;

use super::kind::StorageType;

/// A configured storage backend.
///
/// `config` holds the type-specific settings (host, credentials,
/// endpoints) as a JSON object whose values are strings or integers.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Storage {
    /// Unique storage identifier.
    pub id: StorageId,
    /// Human-readable name (1–100 characters).
    pub name: String,
    /// The backend type.
    pub storage_type: StorageType,
    /// Type-specific configuration map.
    pub config: Value,
    /// Whether this storage receives uploads when none is specified.
    pub is_default: bool,
    /// Whether the storage may be used at all.
    pub is_enabled: bool,
    /// When the storage was created.
    pub created_at: DateTime<Utc>,
    /// When the storage was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    /// Build an enabled, non-default storage record.
    pub fn new(
        id: StorageId,
        name: impl Into<String>,
        storage_type: StorageType,
        config: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            storage_type,
            config,
            is_default: false,
            is_enabled: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark this storage as the default.
    pub fn with_default(mut self, is_default: bool) -> Self {
        self.is_default = is_default;
        self
    }

    /// Enable or disable this storage.
    pub fn with_enabled(mut self, is_enabled: bool) -> Self {
        self.is_enabled = is_enabled;
        self
    }

    /// Raw configuration value for `key`.
    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key).filter(|v| !v.is_null())
    }

    /// Configuration value rendered as a string.
    ///
    /// Numbers and booleans are stringified; objects and arrays yield `None`.
    pub fn config_string(&self, key: &str) -> Option<String> {
        match self.config_value(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Configuration value as a non-blank, trimmed string.
    pub fn config_str_non_blank(&self, key: &str) -> Option<String> {
        self.config_string(key)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Configuration value as an integer (numbers or numeric strings).
    pub fn config_i64(&self, key: &str) -> Option<i64> {
        match self.config_value(key)? {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Configuration value as a boolean (`true`/`false`, `1`/`0`, `"yes"`).
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        match self.config_value(key)? {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|v| v != 0),
            Value::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Some(true),
                "false" | "0" | "no" | "off" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn storage(config: Value) -> Storage {
        Storage::new(StorageId::new(1), "primary", StorageType::Ftp, config)
    }

    #[test]
    fn test_new_storage_is_enabled_and_not_default() {
        let s = storage(json!({}));
        assert!(s.is_enabled);
        assert!(!s.is_default);
    }

    #[test]
    fn test_config_accessors_accept_strings_and_numbers() {
        let s = storage(json!({ "port": "2121", "timeout": 45, "passive": "no", "host": "  " }));
        assert_eq!(s.config_i64("port"), Some(2121));
        assert_eq!(s.config_i64("timeout"), Some(45));
        assert_eq!(s.config_string("timeout").as_deref(), Some("45"));
        assert_eq!(s.config_bool("passive"), Some(false));
        assert_eq!(s.config_str_non_blank("host"), None);
        assert_eq!(s.config_string("missing"), None);
    }

    #[test]
    fn test_null_config_value_counts_as_missing() {
        let s = storage(json!({ "password": null }));
        assert!(s.config_value("password").is_none());
    }
}
