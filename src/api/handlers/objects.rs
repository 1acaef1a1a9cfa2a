use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::response::{mutation_response, ApiError, AppJson, AppQuery, JSend};
use crate::hierarchy::{Listing, MutationOutcome, SearchResults};
use crate::AppState;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CreateFolderRequest {
    pub folder_name: String,
    #[serde(default)]
    pub current_prefix: String,
}

#[derive(Debug, Serialize)]
pub struct CreateFolderResponse {
    pub folder_key: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RenameRequest {
    pub old_key: String,
    pub new_key: String,
    #[serde(default)]
    pub is_folder: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub key: String,
    #[serde(default)]
    pub is_folder: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn list_objects(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ListParams>,
) -> Result<Json<JSend<Listing>>, ApiError> {
    let listing = state.hierarchy.list(&params.prefix).await?;
    Ok(JSend::success(listing))
}

pub async fn create_folder(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<CreateFolderRequest>,
) -> Result<Json<JSend<CreateFolderResponse>>, ApiError> {
    let folder_key = state
        .hierarchy
        .create_folder(&req.current_prefix, &req.folder_name)
        .await?;

    Ok(JSend::success(CreateFolderResponse { folder_key }))
}

pub async fn rename_object(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RenameRequest>,
) -> Result<Response, ApiError> {
    if req.old_key.is_empty() || req.new_key.is_empty() {
        return Err(ApiError::bad_request("old_key and new_key are required"));
    }

    let outcome = if req.is_folder {
        state
            .hierarchy
            .rename_folder(&req.old_key, &req.new_key)
            .await?
    } else {
        state
            .hierarchy
            .rename_file(&req.old_key, &req.new_key)
            .await?
    };

    tracing::debug!(
        old_key = %req.old_key,
        new_key = %req.new_key,
        is_folder = req.is_folder,
        "Renamed"
    );
    Ok(mutation_response(outcome))
}

pub async fn delete_object(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<DeleteParams>,
) -> Result<Response, ApiError> {
    if params.key.is_empty() {
        return Err(ApiError::bad_request("key is required"));
    }

    let outcome = if params.is_folder {
        state.hierarchy.delete_folder(&params.key).await?
    } else {
        state.hierarchy.delete_file(&params.key).await?;
        MutationOutcome {
            succeeded: vec![params.key.clone()],
            failed: Vec::new(),
        }
    };

    Ok(mutation_response(outcome))
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<SearchParams>,
) -> Result<Json<JSend<SearchResults>>, ApiError> {
    let results = state.hierarchy.search(&params.query).await?;
    Ok(JSend::success(results))
}
