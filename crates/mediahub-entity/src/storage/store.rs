//! Persistence collaborator for storage records.

use async_trait::async_trait;

use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;

use super::model::Storage;

/// Read access to configured storages.
#[async_trait]
pub trait StorageStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a storage by ID.
    async fn find_storage_by_id(&self, id: StorageId) -> AppResult<Option<Storage>>;

    /// Find the storage flagged as default.
    ///
    /// Uniqueness of the flag is not enforced; when several storages are
    /// flagged the one with the lowest id is returned.
    async fn find_default_storage(&self) -> AppResult<Option<Storage>>;

    /// List all storages ordered by id.
    async fn find_all_storages(&self) -> AppResult<Vec<Storage>>;
}
