//! Moving renditions between storages.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::job::{JobDispatcher, MigrateFileMessage};
use mediahub_entity::storage::Storage;
use mediahub_entity::video_file::{VideoFile, VideoFileStore};
use mediahub_storage::StorageManager;

use super::report::MigrationReportService;

/// Display name of the local media directory in reports.
pub const LOCAL_STORAGE_NAME: &str = "Local storage";

/// Remote path for a rendition: `videos/<video_id>/<profile>/video_<uuid>.<ext>`.
pub fn remote_path_for(file: &VideoFile) -> String {
    format!(
        "videos/{}/{}/video_{}.{}",
        file.video_id,
        file.profile_slug(),
        Uuid::new_v4().simple(),
        file.extension()
    )
}

/// Media-root relative path for a rendition brought back to local disk:
/// `videos/<profile>/<video_id>_<uuid>.<ext>`.
pub fn local_path_for(file: &VideoFile) -> String {
    format!(
        "videos/{}/{}_{}.{}",
        file.profile_slug(),
        file.video_id,
        Uuid::new_v4().simple(),
        file.extension()
    )
}

fn storage_name(storage: Option<&Storage>) -> &str {
    storage.map_or(LOCAL_STORAGE_NAME, |s| s.name.as_str())
}

/// Plans and performs storage migrations.
#[derive(Debug, Clone)]
pub struct MigrationService {
    manager: Arc<StorageManager>,
    files: Arc<dyn VideoFileStore>,
    dispatcher: Arc<dyn JobDispatcher>,
    reports: MigrationReportService,
}

impl MigrationService {
    /// Create a migration service.
    pub fn new(
        manager: Arc<StorageManager>,
        files: Arc<dyn VideoFileStore>,
        dispatcher: Arc<dyn JobDispatcher>,
        reports: MigrationReportService,
    ) -> Self {
        Self {
            manager,
            files,
            dispatcher,
            reports,
        }
    }

    /// Report service used for migration runs.
    pub fn reports(&self) -> &MigrationReportService {
        &self.reports
    }

    /// Enqueue one migration job per persisted file.
    ///
    /// Files without an id are skipped. `None` as destination moves files
    /// back to local disk.
    pub async fn migrate(
        &self,
        files: &[VideoFile],
        destination: Option<&Storage>,
        migration_id: Option<&str>,
    ) -> AppResult<Vec<MigrateFileMessage>> {
        let destination_id = destination.map(|s| s.id);
        let mut messages = Vec::with_capacity(files.len());
        for file in files {
            let Some(file_id) = file.id else {
                warn!(path = %file.path, "Skipping rendition without id");
                continue;
            };
            let message =
                MigrateFileMessage::new(file_id, destination_id, migration_id.map(str::to_string));
            self.dispatcher.enqueue(message.clone().into()).await?;
            messages.push(message);
        }
        Ok(messages)
    }

    /// Number of renditions currently on `source` (`None` = local disk).
    pub async fn count_files(&self, source: Option<&Storage>) -> AppResult<usize> {
        Ok(self.source_files(source).await?.len())
    }

    /// Start a migration of every file on `source` to `destination`.
    ///
    /// Returns the migration id and the number of jobs queued.
    pub async fn start_migration(
        &self,
        source: Option<&Storage>,
        destination: Option<&Storage>,
    ) -> AppResult<(String, usize)> {
        if source.map(|s| s.id) == destination.map(|s| s.id) {
            return Err(AppError::validation(
                "Source and destination storages must be different",
            ));
        }
        if let Some(dest) = destination
            && !dest.is_enabled
        {
            return Err(AppError::configuration(format!(
                "Destination storage \"{}\" is disabled",
                dest.name
            )));
        }

        let files: Vec<VideoFile> = self
            .source_files(source)
            .await?
            .into_iter()
            .filter(|f| f.id.is_some())
            .collect();
        if files.is_empty() {
            return Err(AppError::validation("No files to migrate"));
        }

        let migration_id = MigrationReportService::generate_migration_id();
        self.reports
            .create_report(
                &migration_id,
                files.len() as u64,
                storage_name(source),
                storage_name(destination),
            )
            .await?;

        let queued = self
            .migrate(&files, destination, Some(&migration_id))
            .await?
            .len();
        info!(
            migration_id = %migration_id,
            queued,
            source = storage_name(source),
            destination = storage_name(destination),
            "Migration started"
        );
        Ok((migration_id, queued))
    }

    async fn source_files(&self, source: Option<&Storage>) -> AppResult<Vec<VideoFile>> {
        match source {
            Some(storage) => self.files.find_video_files_by_storage(storage.id).await,
            None => self.files.find_video_files_without_storage().await,
        }
    }

    /// Move one rendition to `destination` and update it in place.
    ///
    /// The caller persists the updated file.
    pub async fn migrate_file(
        &self,
        file: &mut VideoFile,
        destination: Option<&Storage>,
    ) -> AppResult<()> {
        let source = file
            .remote_location()
            .map(|(id, path)| (id, path.to_string()));

        match (source, destination) {
            (None, None) => {
                info!(file_id = ?file.id, "File is already local, skipping migration");
                Ok(())
            }
            (Some((source_id, _)), Some(dest)) if source_id == dest.id => {
                info!(file_id = ?file.id, storage = %dest.name, "File already on destination");
                Ok(())
            }
            (None, Some(dest)) => {
                let local = self.manager.local_path(file);
                let remote_path = self.upload(&local, file, dest).await?;
                file.assign_remote(dest.id, remote_path);
                info!(file_id = ?file.id, storage = %dest.name, "File migrated from local to remote");
                Ok(())
            }
            (Some((source_id, source_path)), Some(dest)) => {
                let source = self.require_storage(source_id).await?;
                let staging = self.staging_file()?;
                if !self
                    .manager
                    .download_file(&source_path, &staging, &source)
                    .await?
                {
                    return Err(AppError::storage(format!(
                        "Failed to download \"{source_path}\" from storage \"{}\"",
                        source.name
                    )));
                }
                let remote_path = self.upload(&staging, file, dest).await?;
                file.assign_remote(dest.id, remote_path);
                info!(
                    file_id = ?file.id,
                    source = %source.name,
                    destination = %dest.name,
                    "File migrated between storages"
                );
                Ok(())
            }
            (Some((source_id, source_path)), None) => {
                let source = self.require_storage(source_id).await?;
                let relative = local_path_for(file);
                let target = self.manager.media_root().join(&relative);
                if !self
                    .manager
                    .download_file(&source_path, &target, &source)
                    .await?
                {
                    return Err(AppError::storage(format!(
                        "Failed to download \"{source_path}\" from storage \"{}\"",
                        source.name
                    )));
                }
                file.clear_remote();
                file.path = relative;
                info!(file_id = ?file.id, source = %source.name, "File migrated from remote to local");
                Ok(())
            }
        }
    }

    async fn upload(&self, local: &Path, file: &VideoFile, dest: &Storage) -> AppResult<String> {
        let remote_path = remote_path_for(file);
        let result = self
            .manager
            .upload_file(local, &remote_path, Some(dest))
            .await?;
        if !result.is_success() {
            return Err(AppError::storage(
                result
                    .error_message()
                    .unwrap_or("Upload failed")
                    .to_string(),
            ));
        }
        Ok(result
            .remote_path()
            .map(str::to_string)
            .unwrap_or(remote_path))
    }

    async fn require_storage(&self, id: StorageId) -> AppResult<Storage> {
        self.manager
            .find_storage(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Source storage {id} not found")))
    }

    fn staging_file(&self) -> AppResult<tempfile::TempPath> {
        let dir = self.manager.temp_dir();
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create temp directory: {}", dir.display()),
                e,
            )
        })?;
        tempfile::Builder::new()
            .prefix("migration_")
            .tempfile_in(dir)
            .map(|f| f.into_temp_path())
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to create temp file", e))
    }
}
