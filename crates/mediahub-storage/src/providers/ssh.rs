//! SFTP over a native SSH client, used for storages that log in with a password.
//!
//! Every operation opens its own session and closes it afterwards. Transfers
//! are copied between file handles, so a rendition is never held in memory.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::client::{self, Handle};
use russh::keys::ssh_key::PublicKey;
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;
use mediahub_entity::storage::{ConnectionTestResult, StorageQuota, StorageType, UploadResult};

use crate::adapter::{StorageAdapter, elapsed_ms, remote_parent};
use crate::proxy::{proxy_url, signed_proxy_url};
use crate::retry::RetryExecutor;
use crate::signing::SignedUrlService;

use super::local::ensure_parent;
use super::sftp::{SftpAuth, SftpConfig};

fn ssh_error(context: impl Into<String>, e: impl std::fmt::Display) -> AppError {
    AppError::storage(format!("{}: {e}", context.into()))
}

fn io_error(context: impl Into<String>, e: std::io::Error) -> AppError {
    AppError::with_source(ErrorKind::Storage, context, e)
}

/// Accepts any host key.
#[derive(Debug)]
struct SessionHandler;

impl client::Handler for SessionHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

/// An authenticated SSH session with the SFTP subsystem open.
struct SftpConnection {
    session: Handle<SessionHandler>,
    sftp: SftpSession,
}

impl SftpConnection {
    async fn close(self) {
        if let Err(e) = self.sftp.close().await {
            debug!(error = %e, "SFTP subsystem did not close cleanly");
        }
        if let Err(e) = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
        {
            debug!(error = %e, "SSH session did not close cleanly");
        }
    }

    /// Create `dir` and its missing ancestors.
    async fn ensure_dir(&self, dir: &str) -> AppResult<()> {
        let mut current = String::new();
        if dir.starts_with('/') {
            current.push('/');
        }
        for segment in dir.split('/').filter(|s| !s.is_empty()) {
            if !current.is_empty() && !current.ends_with('/') {
                current.push('/');
            }
            current.push_str(segment);
            let exists = self
                .sftp
                .try_exists(current.clone())
                .await
                .map_err(|e| ssh_error(format!("Failed to stat {current}"), e))?;
            if !exists {
                self.sftp
                    .create_dir(current.clone())
                    .await
                    .map_err(|e| ssh_error(format!("Failed to create directory {current}"), e))?;
            }
        }
        Ok(())
    }

    async fn put(&self, local_path: &Path, remote: &str) -> AppResult<()> {
        if let Some(parent) = remote_parent(remote) {
            self.ensure_dir(parent).await?;
        }
        let mut local = fs::File::open(local_path).await.map_err(|e| {
            io_error(format!("Failed to open local file: {}", local_path.display()), e)
        })?;
        let mut file = self
            .sftp
            .create(remote.to_string())
            .await
            .map_err(|e| ssh_error(format!("Failed to create {remote}"), e))?;
        tokio::io::copy(&mut local, &mut file)
            .await
            .map_err(|e| io_error(format!("Failed to write {remote}"), e))?;
        file.shutdown()
            .await
            .map_err(|e| io_error(format!("Failed to close {remote}"), e))
    }

    async fn get(&self, remote: &str, local_path: &Path) -> AppResult<()> {
        let mut file = self
            .sftp
            .open(remote.to_string())
            .await
            .map_err(|e| ssh_error(format!("Failed to open {remote}"), e))?;
        ensure_parent(local_path).await?;
        let mut local = fs::File::create(local_path).await.map_err(|e| {
            io_error(format!("Failed to create file: {}", local_path.display()), e)
        })?;
        tokio::io::copy(&mut file, &mut local)
            .await
            .map_err(|e| io_error(format!("Failed to read {remote}"), e))?;
        local
            .flush()
            .await
            .map_err(|e| io_error("Failed to flush file", e))
    }

    async fn remove(&self, remote: &str) -> AppResult<()> {
        let exists = self
            .sftp
            .try_exists(remote.to_string())
            .await
            .map_err(|e| ssh_error(format!("Failed to stat {remote}"), e))?;
        if !exists {
            return Ok(());
        }
        self.sftp
            .remove_file(remote.to_string())
            .await
            .map_err(|e| ssh_error(format!("Failed to delete {remote}"), e))
    }
}

/// SFTP storage adapter that authenticates with a password.
///
/// Files are served to clients through the signed proxy.
#[derive(Debug, Clone)]
pub struct SshSftpAdapter {
    storage_id: StorageId,
    config: SftpConfig,
    password: String,
    signing: Arc<SignedUrlService>,
    retry: RetryExecutor,
}

impl SshSftpAdapter {
    /// Build the adapter. The config must use password authentication.
    pub fn new(
        storage_id: StorageId,
        config: SftpConfig,
        signing: Arc<SignedUrlService>,
        retry: RetryExecutor,
    ) -> AppResult<Self> {
        let SftpAuth::Password { password } = &config.auth else {
            return Err(AppError::configuration(
                "The SSH client adapter requires authType \"password\"",
            ));
        };
        Ok(Self {
            storage_id,
            password: password.clone(),
            config,
            signing,
            retry,
        })
    }

    /// Absolute remote path of `remote_path` under `basePath`.
    pub fn full_path(&self, remote_path: &str) -> String {
        let base = self.config.base_path.trim_end_matches('/');
        let path = remote_path.trim_start_matches('/');
        if base.is_empty() {
            format!("/{path}")
        } else if path.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{path}")
        }
    }

    async fn connect(&self) -> AppResult<SftpConnection> {
        let endpoint = self.config.endpoint();
        let ssh_config = Arc::new(client::Config {
            inactivity_timeout: Some(self.config.timeout),
            ..Default::default()
        });
        let address = (self.config.host.clone(), self.config.port);

        let mut session = tokio::time::timeout(
            self.config.timeout,
            client::connect(ssh_config, address, SessionHandler),
        )
        .await
        .map_err(|_| AppError::storage(format!("SFTP connection to {endpoint} timed out")))?
        .map_err(|e| ssh_error(format!("SFTP connection to {endpoint} failed"), e))?;

        let auth = session
            .authenticate_password(self.config.username.clone(), self.password.clone())
            .await
            .map_err(|e| ssh_error("SFTP authentication failed", e))?;
        if !auth.success() {
            return Err(AppError::storage(format!(
                "SFTP authentication rejected for user \"{}\"",
                self.config.username
            )));
        }

        let channel = session
            .channel_open_session()
            .await
            .map_err(|e| ssh_error("Failed to open SSH channel", e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| ssh_error("Failed to start the SFTP subsystem", e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| ssh_error("Failed to initialise SFTP", e))?;

        Ok(SftpConnection { session, sftp })
    }

    async fn upload_once(&self, local_path: &Path, remote_path: &str) -> AppResult<()> {
        let conn = self.connect().await?;
        let result = conn.put(local_path, &self.full_path(remote_path)).await;
        conn.close().await;
        result
    }

    async fn download_once(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        let conn = self.connect().await?;
        let result = conn.get(&self.full_path(remote_path), local_path).await;
        conn.close().await;
        result
    }

    async fn delete_once(&self, remote_path: &str) -> AppResult<()> {
        let conn = self.connect().await?;
        let result = conn.remove(&self.full_path(remote_path)).await;
        conn.close().await;
        result
    }

    async fn exists_once(&self, remote_path: &str) -> AppResult<bool> {
        let conn = self.connect().await?;
        let full = self.full_path(remote_path);
        let result = conn
            .sftp
            .try_exists(full.clone())
            .await
            .map_err(|e| ssh_error(format!("Failed to stat {full}"), e));
        conn.close().await;
        result
    }

    async fn mkdir_once(&self, path: &str) -> AppResult<()> {
        let conn = self.connect().await?;
        let result = conn.ensure_dir(&self.full_path(path)).await;
        conn.close().await;
        result
    }

    async fn check_base_path(&self) -> AppResult<()> {
        let conn = self.connect().await?;
        let base = self.full_path("");
        let result = match conn.sftp.try_exists(base.clone()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(AppError::storage(format!("Base path does not exist: {base}"))),
            Err(e) => Err(ssh_error(format!("Failed to stat {base}"), e)),
        };
        conn.close().await;
        result
    }
}

#[async_trait]
impl StorageAdapter for SshSftpAdapter {
    fn storage_type(&self) -> StorageType {
        StorageType::Sftp
    }

    async fn upload(&self, local_path: &Path, remote_path: &str) -> UploadResult {
        if !local_path.is_file() {
            return UploadResult::failure(format!(
                "Local file does not exist: {}",
                local_path.display()
            ));
        }
        match self
            .retry
            .execute("upload", || self.upload_once(local_path, remote_path))
            .await
        {
            Ok(()) => {
                debug!(storage_id = %self.storage_id, remote_path, "Uploaded file");
                UploadResult::success(remote_path)
            }
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Upload failed");
                UploadResult::failure(e.to_string())
            }
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> bool {
        match self
            .retry
            .execute("download", || self.download_once(remote_path, local_path))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Download failed");
                false
            }
        }
    }

    async fn delete(&self, remote_path: &str) -> bool {
        match self
            .retry
            .execute("delete", || self.delete_once(remote_path))
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, remote_path, error = %e, "Delete failed");
                false
            }
        }
    }

    async fn exists(&self, remote_path: &str) -> bool {
        self.retry
            .execute("exists", || self.exists_once(remote_path))
            .await
            .unwrap_or(false)
    }

    fn url(&self, remote_path: &str) -> String {
        proxy_url(remote_path, self.storage_id)
    }

    fn signed_url(&self, remote_path: &str, expires_in: Duration) -> String {
        signed_proxy_url(&self.signing, remote_path, self.storage_id, expires_in)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let started = Instant::now();
        match self.check_base_path().await {
            Ok(()) => ConnectionTestResult::success(
                "SFTP connection successful",
                elapsed_ms(started),
                Some(self.config.server_info()),
            ),
            Err(e) => ConnectionTestResult::failure("SFTP connection failed", e.to_string()),
        }
    }

    async fn quota(&self) -> Option<StorageQuota> {
        None
    }

    async fn create_directory(&self, path: &str) -> bool {
        match self.mkdir_once(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!(storage_id = %self.storage_id, path, error = %e, "Failed to create directory");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RecordingSleeper;

    fn config(base_path: &str, port: u16, auth: SftpAuth) -> SftpConfig {
        SftpConfig {
            host: "127.0.0.1".into(),
            port,
            username: "media".into(),
            auth,
            base_path: base_path.into(),
            timeout: Duration::from_secs(5),
        }
    }

    fn password() -> SftpAuth {
        SftpAuth::Password {
            password: "pw".into(),
        }
    }

    fn adapter(base_path: &str, port: u16, sleeper: RecordingSleeper) -> SshSftpAdapter {
        SshSftpAdapter::new(
            StorageId::new(6),
            config(base_path, port, password()),
            Arc::new(SignedUrlService::new("k").with_clock(|| 100)),
            RetryExecutor::new(Arc::new(sleeper)),
        )
        .unwrap()
    }

    /// A local port with nothing listening on it.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_full_path_under_base() {
        let sleeper = RecordingSleeper::new();
        let srv = adapter("/srv/media/", 22, sleeper.clone());
        assert_eq!(srv.full_path("videos/1/a.mp4"), "/srv/media/videos/1/a.mp4");
        assert_eq!(srv.full_path("/videos/1/a.mp4"), "/srv/media/videos/1/a.mp4");
        assert_eq!(srv.full_path(""), "/srv/media");

        let root = adapter("/", 22, sleeper);
        assert_eq!(root.full_path("videos/a.mp4"), "/videos/a.mp4");
    }

    #[test]
    fn test_key_auth_is_not_accepted() {
        let err = SshSftpAdapter::new(
            StorageId::new(6),
            config("/srv", 22, SftpAuth::Key {
                private_key: "/etc/key".into(),
            }),
            Arc::new(SignedUrlService::new("k")),
            RetryExecutor::default(),
        )
        .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_urls_go_through_the_proxy() {
        let srv = adapter("/srv", 22, RecordingSleeper::new());
        assert_eq!(srv.storage_type(), StorageType::Sftp);
        assert_eq!(srv.url("videos/a.mp4"), "/storage/proxy/videos/a.mp4?storage=6");
        assert!(
            srv.signed_url("videos/a.mp4", Duration::from_secs(60))
                .starts_with("/storage/proxy/videos/a.mp4?expires=160&signature=")
        );
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_after_retries() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("in.mp4");
        fs::write(&local, b"payload").await.unwrap();
        let sleeper = RecordingSleeper::new();
        let srv = adapter("/srv", closed_port(), sleeper.clone());

        let result = srv.upload(&local, "videos/a.mp4").await;
        assert!(!result.is_success());
        assert!(result.error_message().unwrap().contains("after 3 attempts"));
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );

        assert!(!srv.download("videos/a.mp4", &dir.path().join("out.mp4")).await);
        assert!(!srv.exists("videos/a.mp4").await);
        assert!(!srv.delete("videos/a.mp4").await);
        assert!(srv.quota().await.is_none());
    }

    #[tokio::test]
    async fn test_connection_test_reports_unreachable_server() {
        let srv = adapter("/srv", closed_port(), RecordingSleeper::new());
        let result = srv.test_connection().await;
        assert!(!result.success);
        assert_eq!(result.message, "SFTP connection failed");
    }
}
