//! Application state shared across all handlers.

use std::sync::Arc;

use mediahub_storage::StorageManager;

/// Application state passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Storage manager (adapter resolution, signing, temp staging)
    pub storage_manager: Arc<StorageManager>,
}

impl AppState {
    /// Create the state around a storage manager.
    pub fn new(storage_manager: Arc<StorageManager>) -> Self {
        Self { storage_manager }
    }
}
