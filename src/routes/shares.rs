use axum::{
    extract::{Path, Query, Request, State},
    response::{IntoResponse, Response},
    Extension,
};
use serde::Deserialize;

use crate::error::{AppError, Result};
use crate::routes::files::serve_download;
use crate::routes::response::{success, success_with, ApiResponse, JsonBody};
use crate::routes::session::CurrentUser;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateShareRequest {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub to: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ShareQuery {
    /// Present to list the viewers instead of downloading
    pub describe: Option<String>,
    /// Viewer to remove instead of deleting the whole share
    pub user: Option<String>,
}

/// Share keys of files other users shared with the requester
pub async fn list_shares(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResponse<Vec<String>> {
    let shares = state.shares.clone();
    let keys =
        tokio::task::spawn_blocking(move || shares.shared_with(current.username())).await??;
    Ok(success_with(keys))
}

/// Share one of the requester's files with another user
pub async fn create_share(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonBody(payload): JsonBody<CreateShareRequest>,
) -> ApiResponse<String> {
    if payload.file.is_empty() || payload.to.is_empty() {
        return Err(AppError::invalid("fields 'file' and 'to' must be present"));
    }

    let shares = state.shares.clone();
    let key = tokio::task::spawn_blocking(move || {
        shares.create(current.username(), &payload.file, &payload.to)
    })
    .await??;

    Ok(success_with(key))
}

/// Download a shared file, or with `?describe` list its viewers (owner only)
pub async fn read_share(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((owner, path)): Path<(String, String)>,
    Query(query): Query<ShareQuery>,
    request: Request,
) -> Result<Response> {
    let shares = state.shares.clone();
    let sandbox = state.sandbox.clone();

    if query.describe.is_some() {
        let viewers = tokio::task::spawn_blocking(move || {
            let key = sandbox.resolve(&owner, &path)?.namespaced();
            shares.describe(&key, current.username())
        })
        .await??;
        return Ok(success_with(viewers).into_response());
    }

    let download = tokio::task::spawn_blocking(move || {
        shares.download(&owner, &path, current.username())
    })
    .await??;

    Ok(serve_download(download, request).await)
}

/// Delete a share, or with `?user=` revoke a single viewer
pub async fn delete_share(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((owner, path)): Path<(String, String)>,
    Query(query): Query<ShareQuery>,
) -> ApiResponse<()> {
    let shares = state.shares.clone();
    let sandbox = state.sandbox.clone();

    tokio::task::spawn_blocking(move || {
        let key = sandbox.resolve(&owner, &path)?.namespaced();
        match query.user.as_deref().filter(|u| !u.is_empty()) {
            Some(viewer) => shares.remove_viewer(current.username(), &key, viewer),
            None => shares.delete_share(current.username(), &key),
        }
    })
    .await??;

    Ok(success())
}
