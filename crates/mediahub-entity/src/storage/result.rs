//! Outcome values returned by storage adapters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of an adapter upload.
///
/// Fields are private so the success/failure shape can only be built
/// through [`UploadResult::success`] and [`UploadResult::failure`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    success: bool,
    remote_path: Option<String>,
    error_message: Option<String>,
}

impl UploadResult {
    /// A successful upload stored at `remote_path`.
    pub fn success(remote_path: impl Into<String>) -> Self {
        Self {
            success: true,
            remote_path: Some(remote_path.into()),
            error_message: None,
        }
    }

    /// A failed upload.
    pub fn failure(error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            remote_path: None,
            error_message: Some(error_message.into()),
        }
    }

    /// Whether the upload succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Path on the backend, present iff the upload succeeded.
    pub fn remote_path(&self) -> Option<&str> {
        self.remote_path.as_deref()
    }

    /// Failure reason, present iff the upload failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// Result of probing a storage backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    /// Whether the backend is reachable and usable.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Round-trip latency in milliseconds (successful tests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Backend-specific details (server banner, base path, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_info: Option<Map<String, Value>>,
    /// Underlying error text (failed tests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConnectionTestResult {
    /// A successful connection test.
    pub fn success(
        message: impl Into<String>,
        latency_ms: u64,
        server_info: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            success: true,
            message: message.into(),
            latency_ms: Some(latency_ms),
            server_info,
            error_message: None,
        }
    }

    /// A failed connection test.
    pub fn failure(message: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            latency_ms: None,
            server_info: None,
            error_message: Some(error_message.into()),
        }
    }
}
