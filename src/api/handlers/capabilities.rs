use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

use crate::api::response::{ApiError, AppQuery, JSend};
use crate::hierarchy::Capability;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub key: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub key: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Signed URL for downloading or previewing one object.
pub async fn download_url(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<DownloadParams>,
) -> Result<Json<JSend<Capability>>, ApiError> {
    let capability = state.hierarchy.issue_download(&params.key).await?;
    Ok(JSend::success(capability))
}

/// Signed URL the client PUTs the object bytes to.
pub async fn upload_url(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<UploadParams>,
) -> Result<Json<JSend<Capability>>, ApiError> {
    let capability = state
        .hierarchy
        .issue_upload(&params.key, params.content_type.as_deref())
        .await?;
    Ok(JSend::success(capability))
}
