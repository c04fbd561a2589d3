//! Job handlers against local-disk storages and an in-memory catalog.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use mediahub_cache::CacheManager;
use mediahub_core::config::StorageConfig;
use mediahub_core::result::AppResult;
use mediahub_core::types::{StorageId, VideoFileId, VideoId};
use mediahub_database::memory::InMemoryCatalog;
use mediahub_entity::job::{
    DeleteFromStorageMessage, JobDispatcher, JobMessage, MigrateFileMessage,
    UploadToStorageMessage,
};
use mediahub_entity::storage::{Storage, StorageType};
use mediahub_entity::video_file::VideoFile;
use mediahub_service::storage::{MigrationReportService, MigrationService};
use mediahub_storage::retry::{RecordingSleeper, RetryExecutor};
use mediahub_storage::{AdapterRegistry, SignedUrlService, StorageManager};
use mediahub_worker::jobs::{
    DeleteFromStorageJobHandler, MigrateFileJobHandler, UploadToStorageJobHandler,
};
use mediahub_worker::{JobExecutionError, JobHandler};

#[derive(Debug, Default)]
struct RecordingDispatcher {
    jobs: Mutex<Vec<JobMessage>>,
}

impl RecordingDispatcher {
    fn jobs(&self) -> Vec<JobMessage> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobDispatcher for RecordingDispatcher {
    async fn enqueue(&self, job: JobMessage) -> AppResult<()> {
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}

struct Harness {
    dir: tempfile::TempDir,
    media_root: PathBuf,
    catalog: Arc<InMemoryCatalog>,
    dispatcher: Arc<RecordingDispatcher>,
    manager: Arc<StorageManager>,
    reports: MigrationReportService,
    migrations: MigrationService,
}

fn disk(id: i64, root: &Path) -> Storage {
    Storage::new(
        StorageId::new(id),
        format!("disk-{id}"),
        StorageType::Local,
        json!({ "basePath": root.display().to_string() }),
    )
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let media_root = dir.path().join("media");
    std::fs::create_dir_all(&media_root).unwrap();

    let catalog = Arc::new(InMemoryCatalog::new());
    catalog.insert_storage(disk(1, &dir.path().join("remote-1")));
    catalog.insert_storage(disk(3, &dir.path().join("remote-3")).with_enabled(false));

    let config = StorageConfig {
        media_root: media_root.display().to_string(),
        temp_dir: dir.path().join("tmp").display().to_string(),
        ..StorageConfig::default()
    };
    let signing = Arc::new(SignedUrlService::new("secret"));
    let registry = AdapterRegistry::with_defaults(
        &media_root,
        signing.clone(),
        RetryExecutor::new(Arc::new(RecordingSleeper::new())),
    );
    let manager = Arc::new(StorageManager::new(catalog.clone(), registry, signing, &config));
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let reports = MigrationReportService::new(CacheManager::in_memory());
    let migrations = MigrationService::new(
        manager.clone(),
        catalog.clone(),
        dispatcher.clone(),
        reports.clone(),
    );

    Harness {
        dir,
        media_root,
        catalog,
        dispatcher,
        manager,
        reports,
        migrations,
    }
}

impl Harness {
    fn local_file(&self, name: &str) -> VideoFile {
        let relative = format!("encoded/{name}");
        let path = self.media_root.join(&relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"frames").unwrap();
        self.catalog
            .insert_video_file(VideoFile::new(None, VideoId::new(5), relative, 6, "1080p"))
    }

    fn migrate_handler(&self) -> MigrateFileJobHandler {
        MigrateFileJobHandler::new(
            self.catalog.clone(),
            self.manager.clone(),
            self.migrations.clone(),
            self.dispatcher.clone(),
        )
    }
}

#[tokio::test]
async fn test_migration_job_moves_file_and_reports_success() {
    let h = harness();
    let file = h.local_file("a.mp4");
    let file_id = file.id.unwrap();
    h.reports.create_report("migration_t", 1, "Local storage", "disk-1").await.unwrap();

    let job = MigrateFileMessage::new(file_id, Some(StorageId::new(1)), Some("migration_t".into()));
    h.migrate_handler().execute(&job.into()).await.unwrap();

    let saved = h.catalog.video_file(file_id).unwrap();
    assert_eq!(saved.storage_id(), Some(StorageId::new(1)));
    let remote = h.dir.path().join("remote-1").join(saved.remote_path().unwrap());
    assert_eq!(std::fs::read(remote).unwrap(), b"frames");

    let summary = h.reports.summary("migration_t").await.unwrap();
    assert_eq!(summary.success_count, 1);
    assert!(summary.is_complete);
    assert!(h.dispatcher.jobs().is_empty());
}

#[tokio::test]
async fn test_migration_to_missing_or_disabled_storage_is_dropped() {
    let h = harness();
    let file = h.local_file("a.mp4");
    h.reports.create_report("migration_t", 2, "a", "b").await.unwrap();

    for storage_id in [StorageId::new(99), StorageId::new(3)] {
        let job = MigrateFileMessage::new(file.id.unwrap(), Some(storage_id), Some("migration_t".into()));
        assert!(h.migrate_handler().execute(&job.into()).await.unwrap().is_none());
    }

    let summary = h.reports.summary("migration_t").await.unwrap();
    assert_eq!(summary.failure_count, 2);
    assert!(h.dispatcher.jobs().is_empty());
    assert!(!h.catalog.video_file(file.id.unwrap()).unwrap().is_remote());
}

#[tokio::test]
async fn test_migration_of_vanished_file_completes_the_report() {
    let h = harness();
    h.reports.create_report("migration_t", 1, "Local storage", "disk-1").await.unwrap();

    let gone = VideoFileId::new(404);
    let job = MigrateFileMessage::new(gone, Some(StorageId::new(1)), Some("migration_t".into()));
    assert!(h.migrate_handler().execute(&job.into()).await.unwrap().is_none());

    let summary = h.reports.summary("migration_t").await.unwrap();
    assert_eq!(summary.failure_count, 1);
    assert!(summary.is_complete);
    let failures = h.reports.failures("migration_t").await.unwrap();
    assert_eq!(failures[0].file_id, gone);
    assert!(failures[0].error.contains("not found"));
    assert!(h.dispatcher.jobs().is_empty());
}

#[tokio::test]
async fn test_failed_migration_retries_then_records_failure() {
    let h = harness();
    let file = h.catalog.insert_video_file(VideoFile::new(
        None,
        VideoId::new(5),
        "encoded/missing.mp4",
        6,
        "1080p",
    ));
    h.reports.create_report("migration_t", 1, "a", "b").await.unwrap();
    let first = MigrateFileMessage::new(file.id.unwrap(), Some(StorageId::new(1)), Some("migration_t".into()));

    let err = h.migrate_handler().execute(&first.clone().into()).await.unwrap_err();
    assert!(matches!(err, JobExecutionError::Transient(_)));
    assert_eq!(h.dispatcher.jobs(), vec![JobMessage::from(first.retry())]);

    let last = first.retry().retry();
    let err = h.migrate_handler().execute(&last.into()).await.unwrap_err();
    assert!(matches!(err, JobExecutionError::Permanent(_)));
    assert_eq!(h.dispatcher.jobs().len(), 1);

    let failures = h.reports.failures("migration_t").await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].file_id, file.id.unwrap());
}

#[tokio::test]
async fn test_delete_job() {
    let h = harness();
    let handler = DeleteFromStorageJobHandler::new(h.manager.clone(), h.dispatcher.clone());
    let remote = h.dir.path().join("remote-1/videos/5/clip.mp4");
    std::fs::create_dir_all(remote.parent().unwrap()).unwrap();
    std::fs::write(&remote, b"x").unwrap();

    let job = DeleteFromStorageMessage::new(StorageId::new(1), "videos/5/clip.mp4");
    handler.execute(&job.into()).await.unwrap();
    assert!(!remote.exists());

    let orphan = DeleteFromStorageMessage::new(StorageId::new(42), "videos/5/clip.mp4");
    assert!(handler.execute(&orphan.into()).await.unwrap().is_none());

    let disabled = DeleteFromStorageMessage::new(StorageId::new(3), "videos/5/clip.mp4");
    let err = handler.execute(&disabled.clone().into()).await.unwrap_err();
    assert!(matches!(err, JobExecutionError::Transient(_)));
    assert_eq!(h.dispatcher.jobs(), vec![JobMessage::from(disabled.retry())]);

    let err = handler
        .execute(&disabled.retry().retry().into())
        .await
        .unwrap_err();
    match err {
        JobExecutionError::Permanent(msg) => assert!(msg.contains("manual cleanup required")),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_upload_job() {
    let h = harness();
    let handler =
        UploadToStorageJobHandler::new(h.catalog.clone(), h.manager.clone(), h.dispatcher.clone());
    let file = h.local_file("b.mp4");
    let file_id = file.id.unwrap();

    let job: JobMessage = UploadToStorageMessage::new(file_id, file.path.clone()).into();
    assert!(handler.execute(&job).await.unwrap().is_none());
    assert!(!h.catalog.video_file(file_id).unwrap().is_remote());

    h.catalog.insert_storage(disk(1, &h.dir.path().join("remote-1")).with_default(true));
    handler.execute(&job).await.unwrap();
    let saved = h.catalog.video_file(file_id).unwrap();
    assert_eq!(saved.storage_id(), Some(StorageId::new(1)));
    assert!(saved.remote_path().unwrap().starts_with("videos/5/1080p/video_"));

    let missing: JobMessage = UploadToStorageMessage::new(file_id, "encoded/nope.mp4").into();
    assert!(handler.execute(&missing).await.unwrap().is_none());
}
