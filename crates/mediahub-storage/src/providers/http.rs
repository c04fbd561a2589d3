//! HTTP object storage adapter.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Method, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use mediahub_core::error::{AppError, ErrorKind};
use mediahub_core::result::AppResult;
use mediahub_entity::storage::{
    ConnectionTestResult, Storage, StorageQuota, StorageType, UploadResult,
};

use crate::adapter::{StorageAdapter, elapsed_ms};
use crate::retry::RetryExecutor;

use super::config_timeout;
use super::local::ensure_parent;

const DEFAULT_TIMEOUT_SECONDS: i64 = 60;
const DEFAULT_AUTH_HEADER: &str = "Authorization";

/// Endpoints and credentials of an HTTP storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    pub base_url: String,
    pub upload_endpoint: String,
    pub delete_endpoint: String,
    pub download_endpoint: Option<String>,
    pub exists_endpoint: Option<String>,
    pub quota_endpoint: Option<String>,
    pub auth_token: String,
    pub auth_header: String,
    pub timeout: Duration,
}

impl HttpConfig {
    /// Read the settings from a storage record. `deleteEndpoint` defaults to `uploadEndpoint`.
    pub fn from_storage(storage: &Storage) -> AppResult<Self> {
        let required = |key: &str| {
            storage
                .config_str_non_blank(key)
                .ok_or_else(|| AppError::configuration(format!("HTTP storage requires \"{key}\"")))
        };
        let upload_endpoint = required("uploadEndpoint")?;
        Ok(Self {
            base_url: required("baseUrl")?,
            delete_endpoint: storage
                .config_str_non_blank("deleteEndpoint")
                .unwrap_or_else(|| upload_endpoint.clone()),
            upload_endpoint,
            download_endpoint: storage.config_str_non_blank("downloadEndpoint"),
            exists_endpoint: storage.config_str_non_blank("existsEndpoint"),
            quota_endpoint: storage.config_str_non_blank("quotaEndpoint"),
            auth_token: required("authToken")?,
            auth_header: storage
                .config_str_non_blank("authHeader")
                .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string()),
            timeout: config_timeout(storage, DEFAULT_TIMEOUT_SECONDS)?,
        })
    }

    /// Absolute endpoints are used verbatim; relative ones are joined onto `baseUrl`.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            join_url(&self.base_url, endpoint)
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    used: i64,
    total: Option<i64>,
}

/// Adapter for HTTP object stores with upload/delete endpoints.
#[derive(Debug, Clone)]
pub struct HttpStorageAdapter {
    config: HttpConfig,
    client: Client,
    retry: RetryExecutor,
}

impl HttpStorageAdapter {
    /// Build the adapter and its HTTP client.
    pub fn new(config: HttpConfig, retry: RetryExecutor) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                AppError::with_source(ErrorKind::Configuration, "Failed to build HTTP client", e)
            })?;
        Ok(Self {
            config,
            client,
            retry,
        })
    }

    /// Endpoint settings.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .header(self.config.auth_header.as_str(), self.config.auth_token.as_str())
    }

    fn with_path_query(url: &str, remote_path: &str) -> AppResult<String> {
        let mut url = Url::parse(url).map_err(|e| {
            AppError::with_source(ErrorKind::Configuration, format!("Invalid URL: {url}"), e)
        })?;
        url.query_pairs_mut().append_pair("path", remote_path);
        Ok(url.into())
    }

    fn transport_error(action: &str, e: reqwest::Error) -> AppError {
        AppError::with_source(ErrorKind::ExternalService, format!("HTTP {action} failed: {e}"), e)
    }

    async fn send_upload(&self, local_path: &Path, remote_path: &str) -> AppResult<String> {
        let file = fs::File::open(local_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to open local file: {}", local_path.display()),
                e,
            )
        })?;
        let length = file
            .metadata()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to stat local file", e))?
            .len();
        let file_name = Path::new(remote_path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        let form = Form::new()
            .part(
                "file",
                Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), length)
                    .file_name(file_name),
            )
            .text("path", remote_path.to_string());

        let url = self.config.endpoint_url(&self.config.upload_endpoint);
        let response = self
            .request(Method::POST, &url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Self::transport_error("upload", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::external(format!(
                "HTTP upload failed with status {status}: {body}"
            )));
        }

        let stored = response
            .json::<UploadResponse>()
            .await
            .ok()
            .and_then(|r| r.path)
            .filter(|p| !p.trim().is_empty());
        Ok(stored.unwrap_or_else(|| remote_path.to_string()))
    }

    async fn fetch(&self, remote_path: &str, local_path: &Path) -> AppResult<()> {
        let endpoint = self
            .config
            .download_endpoint
            .as_deref()
            .map(|e| self.config.endpoint_url(e))
            .unwrap_or_else(|| self.config.base_url.clone());
        let url = join_url(&endpoint, remote_path);

        let response = self
            .request(Method::GET, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("download", e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::external(format!(
                "HTTP download failed with status {status}"
            )));
        }

        ensure_parent(local_path).await?;
        let mut file = fs::File::create(local_path).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create file: {}", local_path.display()),
                e,
            )
        })?;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Self::transport_error("download", e))?;
            file.write_all(&chunk).await.map_err(|e| {
                AppError::with_source(ErrorKind::Storage, "Failed to write chunk", e)
            })?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Storage, "Failed to flush file", e))
    }

    async fn send_delete(&self, remote_path: &str) -> AppResult<()> {
        let url = Self::with_path_query(
            &self.config.endpoint_url(&self.config.delete_endpoint),
            remote_path,
        )?;
        let response = self
            .request(Method::DELETE, &url)
            .send()
            .await
            .map_err(|e| Self::transport_error("delete", e))?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(AppError::external(format!(
                "HTTP delete failed with status {status}"
            )))
        }
    }
}

#[async_trait]
impl StorageAdapter for HttpStorageAdapter {
    fn storage_type(&self) -> StorageType {
        StorageType::Http
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
            .execute("upload", || self.send_upload(local_path, remote_path))
            .await
        {
            Ok(stored_path) => {
                debug!(remote_path, stored_path = %stored_path, "Uploaded file over HTTP");
                UploadResult::success(stored_path)
            }
            Err(e) => {
                warn!(remote_path, error = %e, "HTTP upload failed");
                UploadResult::failure(e.to_string())
            }
        }
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> bool {
        self.retry
            .execute("download", || self.fetch(remote_path, local_path))
            .await
            .map_err(|e| warn!(remote_path, error = %e, "HTTP download failed"))
            .is_ok()
    }

    async fn delete(&self, remote_path: &str) -> bool {
        self.retry
            .execute("delete", || self.send_delete(remote_path))
            .await
            .map_err(|e| warn!(remote_path, error = %e, "HTTP delete failed"))
            .is_ok()
    }

    async fn exists(&self, remote_path: &str) -> bool {
        let endpoint = self
            .config
            .exists_endpoint
            .as_deref()
            .map(|e| self.config.endpoint_url(e))
            .unwrap_or_else(|| self.config.base_url.clone());
        match self
            .request(Method::HEAD, &join_url(&endpoint, remote_path))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(remote_path, error = %e, "HTTP exists check failed");
                false
            }
        }
    }

    fn url(&self, remote_path: &str) -> String {
        join_url(&self.config.base_url, remote_path)
    }

    fn signed_url(&self, remote_path: &str, _expires_in: Duration) -> String {
        self.url(remote_path)
    }

    async fn test_connection(&self) -> ConnectionTestResult {
        let started = Instant::now();
        match self.request(Method::HEAD, &self.config.base_url).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || status.is_redirection() {
                    let mut info = Map::new();
                    info.insert("baseUrl".into(), Value::String(self.config.base_url.clone()));
                    info.insert("statusCode".into(), Value::from(status.as_u16()));
                    ConnectionTestResult::success(
                        "HTTP storage is reachable",
                        elapsed_ms(started),
                        Some(info),
                    )
                } else {
                    ConnectionTestResult::failure(
                        "HTTP storage returned an error status",
                        format!("HTTP server returned status code: {}", status.as_u16()),
                    )
                }
            }
            Err(e) => ConnectionTestResult::failure("HTTP storage is unreachable", e.to_string()),
        }
    }

    async fn quota(&self) -> Option<StorageQuota> {
        let endpoint = self.config.quota_endpoint.as_deref()?;
        let response = self
            .request(Method::GET, &self.config.endpoint_url(endpoint))
            .send()
            .await
            .ok()?;
        if response.status() != StatusCode::OK {
            return None;
        }
        let quota = response.json::<QuotaResponse>().await.ok()?;
        Some(StorageQuota::new(quota.used, quota.total))
    }

    async fn create_directory(&self, _path: &str) -> bool {
        true
    }
}
