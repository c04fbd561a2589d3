//! HTTP adapter against a local object-store stub.

use std::sync::Arc;

use axum::extract::{Path as UrlPath, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::json;

use mediahub_core::types::StorageId;
use mediahub_entity::storage::{Storage, StorageType};
use mediahub_storage::StorageAdapter;
use mediahub_storage::providers::{HttpConfig, HttpStorageAdapter};
use mediahub_storage::retry::{RecordingSleeper, RetryExecutor};

const TOKEN: &str = "token-123";
/// Every uploaded payload ends with this; the stub rejects bodies without it.
const MARKER: &[u8] = b"--end-of-frames--";

fn payload(len: usize) -> Vec<u8> {
    let mut data: Vec<u8> = (0..len).map(|i| b'a' + (i % 26) as u8).collect();
    data.extend_from_slice(MARKER);
    data
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some(TOKEN)
}

async fn upload(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if !body.windows(MARKER.len()).any(|w| w == MARKER) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    Json(json!({ "path": "stored/clip.mp4" })).into_response()
}

#[derive(Deserialize)]
struct PathQuery {
    path: String,
}

async fn delete(Query(query): Query<PathQuery>) -> StatusCode {
    match query.path.as_str() {
        "videos/gone.mp4" => StatusCode::NOT_FOUND,
        "videos/locked.mp4" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::NO_CONTENT,
    }
}

async fn object(UrlPath(path): UrlPath<String>) -> impl IntoResponse {
    if path == "videos/a.mp4" {
        (StatusCode::OK, "video-bytes").into_response()
    } else {
        StatusCode::NOT_FOUND.into_response()
    }
}

async fn quota() -> Json<serde_json::Value> {
    Json(json!({ "used": 250, "total": 1000 }))
}

async fn spawn_stub() -> String {
    let app = Router::new()
        .route("/store", get(|| async { "ok" }))
        .route("/store/api/upload", axum::routing::post(upload).delete(delete))
        .route("/store/api/quota", get(quota))
        .route("/store/{*path}", get(object));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/store")
}

fn adapter(base_url: &str, token: &str) -> (HttpStorageAdapter, Arc<RecordingSleeper>) {
    let storage = Storage::new(
        StorageId::new(1),
        "cdn",
        StorageType::Http,
        json!({
            "baseUrl": base_url,
            "authToken": token,
            "uploadEndpoint": "/api/upload",
            "quotaEndpoint": "/api/quota"
        }),
    );
    let sleeper = Arc::new(RecordingSleeper::new());
    let config = HttpConfig::from_storage(&storage).unwrap();
    let adapter = HttpStorageAdapter::new(config, RetryExecutor::new(sleeper.clone())).unwrap();
    (adapter, sleeper)
}

#[tokio::test]
async fn test_upload_uses_path_returned_by_server() {
    let base = spawn_stub().await;
    let (adapter, sleeper) = adapter(&base, TOKEN);
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("clip.mp4");
    std::fs::write(&local, payload(6)).unwrap();

    let result = adapter.upload(&local, "videos/1/720p/clip.mp4").await;
    assert!(result.is_success(), "{:?}", result.error_message());
    assert_eq!(result.remote_path(), Some("stored/clip.mp4"));
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_upload_streams_the_whole_file() {
    let base = spawn_stub().await;
    let (adapter, sleeper) = adapter(&base, TOKEN);
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("long.mp4");
    std::fs::write(&local, payload(256 * 1024)).unwrap();

    let result = adapter.upload(&local, "videos/long.mp4").await;
    assert!(result.is_success(), "{:?}", result.error_message());
    assert!(sleeper.delays().is_empty());
}

#[tokio::test]
async fn test_upload_with_bad_token_fails_after_retries() {
    let base = spawn_stub().await;
    let (adapter, sleeper) = adapter(&base, "wrong");
    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("clip.mp4");
    std::fs::write(&local, payload(6)).unwrap();

    let result = adapter.upload(&local, "videos/clip.mp4").await;
    assert!(!result.is_success());
    assert!(result.error_message().unwrap().contains("after 3 attempts"));
    assert_eq!(sleeper.delays().len(), 2);
}

#[tokio::test]
async fn test_download_and_exists() {
    let base = spawn_stub().await;
    let (adapter, _) = adapter(&base, TOKEN);
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("nested/a.mp4");

    assert!(adapter.download("videos/a.mp4", &target).await);
    assert_eq!(std::fs::read(&target).unwrap(), b"video-bytes");
    assert!(!adapter.download("videos/missing.mp4", &dir.path().join("m.mp4")).await);

    assert!(adapter.exists("videos/a.mp4").await);
    assert!(!adapter.exists("videos/missing.mp4").await);
}

#[tokio::test]
async fn test_delete_treats_not_found_as_success() {
    let base = spawn_stub().await;
    let (adapter, _) = adapter(&base, TOKEN);
    assert!(adapter.delete("videos/a.mp4").await);
    assert!(adapter.delete("videos/gone.mp4").await);
    assert!(!adapter.delete("videos/locked.mp4").await);
}

#[tokio::test]
async fn test_quota_and_connection() {
    let base = spawn_stub().await;
    let (adapter, _) = adapter(&base, TOKEN);

    let quota = adapter.quota().await.unwrap();
    assert_eq!(quota.used_bytes, 250);
    assert_eq!(quota.total_bytes, Some(1000));

    let result = adapter.test_connection().await;
    assert!(result.success);
    assert!(result.latency_ms.is_some());
}

#[tokio::test]
async fn test_unreachable_server() {
    let (adapter, _) = adapter("http://127.0.0.1:9", TOKEN);
    let result = adapter.test_connection().await;
    assert!(!result.success);
    assert!(adapter.quota().await.is_none());
}
