//! Proxy URLs and scoped downloads for storages that are not publicly reachable.

use std::path::Path;
use std::time::Duration;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use tempfile::TempPath;
use tokio_util::io::ReaderStream;
use tracing::debug;

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_core::types::StorageId;

use crate::adapter::StorageAdapter;
use crate::signing::SignedUrlService;

/// Route prefix of the proxy endpoint.
pub const PROXY_PREFIX: &str = "/storage/proxy/";

/// Characters escaped inside one path segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.');

/// Percent-encode each segment of `remote_path`, keeping `/` separators.
pub fn encode_path(remote_path: &str) -> String {
    remote_path
        .trim_start_matches('/')
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Unsigned proxy URL: `/storage/proxy/<encoded path>?storage=<id>`.
pub fn proxy_url(remote_path: &str, storage_id: StorageId) -> String {
    format!("{PROXY_PREFIX}{}?storage={storage_id}", encode_path(remote_path))
}

/// Signed proxy URL. The signature covers the decoded remote path and storage id.
pub fn signed_proxy_url(
    signing: &SignedUrlService,
    remote_path: &str,
    storage_id: StorageId,
    expires_in: Duration,
) -> String {
    let path = remote_path.trim_start_matches('/');
    format!(
        "{PROXY_PREFIX}{}?{}",
        encode_path(path),
        signing.signature_query(path, expires_in, Some(storage_id))
    )
}

/// MIME type guessed from the file extension.
pub fn mime_from_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "ts" => "video/mp2t",
        "m3u8" => "application/vnd.apple.mpegurl",
        "mpd" => "application/dash+xml",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "vtt" => "text/vtt",
        "srt" => "application/x-subrip",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// A remote file staged in a temp file for streaming.
///
/// The temp file is removed when the value, or the stream made from it, is dropped.
#[derive(Debug)]
pub struct ProxyDownload {
    temp: TempPath,
    file_name: String,
    content_type: &'static str,
    size: u64,
}

impl ProxyDownload {
    /// Download `remote_path` into `temp_dir`. `Ok(None)` when the adapter could not fetch it.
    pub async fn fetch(
        adapter: &dyn StorageAdapter,
        remote_path: &str,
        temp_dir: &Path,
    ) -> AppResult<Option<Self>> {
        tokio::fs::create_dir_all(temp_dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create temp directory: {}", temp_dir.display()),
                e,
            )
        })?;
        let temp = tempfile::Builder::new()
            .prefix("proxy_")
            .tempfile_in(temp_dir)
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to create temp file", e))?
            .into_temp_path();

        if !adapter.download(remote_path, &temp).await {
            debug!(remote_path, "Proxy download failed");
            return Ok(None);
        }

        let size = tokio::fs::metadata(&temp)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to stat temp file", e))?
            .len();
        let file_name = Path::new(remote_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("download")
            .to_string();

        Ok(Some(Self {
            temp,
            content_type: mime_from_path(&file_name),
            file_name,
            size,
        }))
    }

    /// Location of the staged file.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Base name of the remote file.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// MIME type from the extension.
    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Stream the staged file. The temp file lives exactly as long as the stream.
    pub async fn into_stream(
        self,
    ) -> AppResult<impl Stream<Item = std::io::Result<Bytes>> + Send + 'static> {
        let file = tokio::fs::File::open(&self.temp)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to open temp file", e))?;
        let guard = self.temp;
        Ok(ReaderStream::new(file).map(move |chunk| {
            let _temp = &guard;
            chunk
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_keeps_separators() {
        assert_eq!(encode_path("videos/1/my clip#1.mp4"), "videos/1/my%20clip%231.mp4");
        assert_eq!(encode_path("/a/b.mp4"), "a/b.mp4");
    }

    #[test]
    fn test_proxy_url_carries_storage() {
        assert_eq!(
            proxy_url("videos/1/a.mp4", StorageId::new(7)),
            "/storage/proxy/videos/1/a.mp4?storage=7"
        );
    }

    #[test]
    fn test_signed_proxy_url_verifies_against_decoded_path() {
        let signing = SignedUrlService::new("k").with_clock(|| 1000);
        let url = signed_proxy_url(
            &signing,
            "videos/a b.mp4",
            StorageId::new(2),
            Duration::from_secs(60),
        );
        assert!(url.starts_with("/storage/proxy/videos/a%20b.mp4?expires=1060&signature="));
        let parts = signing.parse_signed_url(&url).unwrap();
        assert!(signing.verify_signed_url(
            "videos/a b.mp4",
            parts.expires,
            &parts.signature,
            parts.storage_id
        ));
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path("a/b.MP4"), "video/mp4");
        assert_eq!(mime_from_path("a/b.webm"), "video/webm");
        assert_eq!(mime_from_path("noext"), "application/octet-stream");
    }
}
