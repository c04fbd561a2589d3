//! Storage quota value object.

use serde::{Deserialize, Serialize};

/// Usage percentage at which a storage is flagged (inclusive).
pub const WARNING_THRESHOLD_PERCENT: f64 = 80.0;

/// Used/total capacity reported by a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageQuota {
    /// Currently used bytes.
    pub used_bytes: i64,
    /// Total capacity in bytes (`None` = unknown or unlimited).
    pub total_bytes: Option<i64>,
}

impl StorageQuota {
    /// Create a quota from used and total values.
    pub fn new(used_bytes: i64, total_bytes: Option<i64>) -> Self {
        Self {
            used_bytes,
            total_bytes,
        }
    }

    /// Usage as a percentage of the total. `None` when the total is unknown or zero.
    pub fn usage_percent(&self) -> Option<f64> {
        match self.total_bytes {
            Some(total) if total > 0 => Some(self.used_bytes as f64 / total as f64 * 100.0),
            _ => None,
        }
    }

    /// Remaining bytes, clamped at zero. `None` when the total is unknown.
    pub fn available_bytes(&self) -> Option<i64> {
        self.total_bytes
            .map(|total| total.saturating_sub(self.used_bytes).max(0))
    }

    /// Check if adding `additional_bytes` would exceed the known total.
    pub fn would_exceed(&self, additional_bytes: i64) -> bool {
        match self.total_bytes {
            Some(total) if total > 0 => self.used_bytes.saturating_add(additional_bytes) > total,
            _ => false,
        }
    }

    /// Whether usage is at or above [`WARNING_THRESHOLD_PERCENT`].
    pub fn is_warning_threshold_exceeded(&self) -> bool {
        self.usage_percent()
            .is_some_and(|percent| percent >= WARNING_THRESHOLD_PERCENT)
    }
}
