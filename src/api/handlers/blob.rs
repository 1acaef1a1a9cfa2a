use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::hierarchy::paths;
use crate::object_store::{ObjectStoreError, PresignOp, SignedParams, UrlSigner};
use crate::AppState;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

fn signer(state: &AppState) -> Result<&UrlSigner, ApiError> {
    state
        .signer
        .as_deref()
        .ok_or_else(|| ApiError::not_found("Blob access is not served by this backend"))
}

/// Serve object bytes for a signed download URL.
/// Route: GET /blob/*key
pub async fn get_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    AppQuery(params): AppQuery<SignedParams>,
) -> Result<Response, ApiError> {
    signer(&state)?.verify(&PresignOp::Get, &key, &params, Utc::now())?;

    let meta = state.object_store.head(&key).await?;
    let data = state.object_store.get(&key).await.map_err(|e| match e {
        ObjectStoreError::NotFound(_) => ApiError::not_found("Object content not found"),
        other => other.into(),
    })?;

    let mut response = (StatusCode::OK, data).into_response();
    let headers = response.headers_mut();

    let content_type = meta
        .content_type
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    headers.insert(
        header::CONTENT_TYPE,
        content_type
            .parse()
            .unwrap_or(header::HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    // Inline so browsers can preview; the filename is the key's last segment
    let filename = paths::name_of(&key).replace('"', "");
    if let Ok(value) = format!("inline; filename=\"{filename}\"").parse() {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    // The URL itself expires, so never let a shared cache outlive it
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("private, no-store"),
    );

    Ok(response)
}

/// Store the request body for a signed upload URL.
/// Route: PUT /blob/*key
pub async fn put_blob(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    AppQuery(params): AppQuery<SignedParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<JSend<()>>, ApiError> {
    // The signature binds the content type, so the upload must repeat it
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    let op = PresignOp::Put {
        content_type: content_type.clone(),
    };
    signer(&state)?.verify(&op, &key, &params, Utc::now())?;

    if body.len() as u64 > state.config.limits.max_upload_size {
        return Err(ApiError::payload_too_large(format!(
            "Object exceeds maximum upload size of {} bytes",
            state.config.limits.max_upload_size
        )));
    }

    let byte_size = body.len();
    state.object_store.put(&key, body, &content_type).await?;

    tracing::debug!(key = %key, byte_size, "Stored object via signed upload");
    Ok(JSend::success(()))
}
