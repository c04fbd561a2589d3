//! Signed proxy for storages browsers cannot reach (FTP, SFTP).

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::{info, warn};

use mediahub_core::error::AppError;
use mediahub_core::types::StorageId;
use mediahub_storage::signing::SignedQuery;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /storage/proxy/{*path}?storage=<id>[&expires=..&signature=..]
///
/// Stages the remote file in a temp file and streams it back. The temp file is
/// removed once the body has been sent or the client goes away.
pub async fn proxy_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, ApiError> {
    let storage_id = parse_storage_id(query.storage.as_deref())?;
    let manager = &state.storage_manager;

    let storage = manager
        .find_storage(storage_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Storage {storage_id} not found")))?;

    let signed = query.signature.is_some() || query.expires.is_some();
    if signed && !manager.signing().verify_query(&path, &query) {
        warn!(%storage_id, path = %path, "Rejected proxy request with invalid signature");
        return Err(AppError::verification("Invalid or expired signature").into());
    }

    if !storage.is_enabled {
        return Err(AppError::verification(format!(
            "Storage \"{}\" is disabled",
            storage.name
        ))
        .into());
    }
    if !storage.storage_type.is_proxied() {
        return Err(AppError::verification(format!(
            "Storage type \"{}\" is not served through the proxy",
            storage.storage_type
        ))
        .into());
    }

    let download = manager
        .proxy_download(&path, &storage)
        .await?
        .ok_or_else(|| AppError::not_found(format!("File not found: {path}")))?;

    info!(
        %storage_id,
        path = %path,
        size = download.size(),
        "Proxying remote file"
    );

    let headers = [
        (header::CONTENT_TYPE, download.content_type().to_string()),
        (header::CONTENT_LENGTH, download.size().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", header_safe(download.file_name())),
        ),
        (header::ACCEPT_RANGES, "bytes".to_string()),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    let stream = download.into_stream().await?;

    Ok((headers, Body::from_stream(stream)).into_response())
}

fn parse_storage_id(raw: Option<&str>) -> Result<StorageId, AppError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::validation("Missing storage parameter"))?;
    raw.parse::<StorageId>()
        .map_err(|_| AppError::validation(format!("Invalid storage parameter: {raw}")))
}

/// File name restricted to printable ASCII without quotes.
fn header_safe(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
