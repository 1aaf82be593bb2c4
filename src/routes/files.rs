use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        Multipart, Path, Query, Request, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use serde::{Deserialize, Serialize};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::error::{AppError, Result};
use crate::models::{FileInfo, Listing};
use crate::routes::response::{success, success_with, ApiResponse, JsonBody};
use crate::routes::session::CurrentUser;
use crate::services::sandbox::{base_name, Download, Relocation, Upload};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct FileQuery {
    /// Present to stream the file instead of describing it
    pub download: Option<String>,
    /// Present to create a directory instead of uploading
    pub directory: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RelocateRequest {
    pub filename: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Relocated {
    pub path: String,
}

fn virtual_path(path: Option<Path<String>>) -> String {
    path.map(|Path(p)| p).unwrap_or_default()
}

/// Describe a file or list a directory; `?download` streams a file
pub async fn read_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    path: Option<Path<String>>,
    Query(query): Query<FileQuery>,
    request: Request,
) -> Result<Response> {
    let sandbox = state.sandbox.clone();
    let virtual_path = virtual_path(path);

    if query.download.is_some() {
        let download = tokio::task::spawn_blocking(move || {
            let path = sandbox.resolve(current.username(), &virtual_path)?;
            sandbox.download(&path)
        })
        .await??;
        return Ok(serve_download(download, request).await);
    }

    let listing: Listing = tokio::task::spawn_blocking(move || {
        let path = sandbox.resolve(current.username(), &virtual_path)?;
        sandbox.list(&path)
    })
    .await??;

    Ok(success_with(listing).into_response())
}

/// Stream a resolved file with range support and an attachment name
pub async fn serve_download(download: Download, request: Request) -> Response {
    let mut response = ServeFile::new(&download.path)
        .oneshot(request)
        .await
        .into_response();

    if response.status() == StatusCode::OK || response.status() == StatusCode::PARTIAL_CONTENT {
        let disposition = format!(
            "attachment; filename=\"{}\"",
            download.name.replace(['"', '\\'], "_")
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            response
                .headers_mut()
                .insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

/// Create a directory (`?directory`) or upload a file into a directory
///
/// Uploads are multipart with the content in a field named `file`; the
/// field's file name becomes the new entry's name. Existing entries are
/// never overwritten.
pub async fn create_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    path: Option<Path<String>>,
    Query(query): Query<FileQuery>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> ApiResponse<FileInfo> {
    let sandbox = state.sandbox.clone();
    let virtual_path = virtual_path(path);

    if query.directory.is_some() {
        let info = tokio::task::spawn_blocking(move || {
            let path = sandbox.resolve(current.username(), &virtual_path)?;
            sandbox.create_directory(&path)
        })
        .await??;
        tracing::info!("Directory created");
        return Ok(success_with(info));
    }

    let mut multipart = multipart.map_err(|_| {
        AppError::invalid("header 'Content-Type' must be 'multipart/form-data'")
    })?;

    let directory = {
        let sandbox = sandbox.clone();
        let username = current.username().to_string();
        tokio::task::spawn_blocking(move || {
            let directory = sandbox.resolve(&username, &virtual_path)?;
            if !sandbox.metadata(&directory)?.is_dir() {
                return Err(AppError::invalid("cannot upload to file"));
            }
            Ok(directory)
        })
        .await??
    };

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let name = field
            .file_name()
            .and_then(base_name)
            .ok_or_else(|| AppError::invalid("field 'file' must be a file"))?;
        let target = sandbox.resolve(
            current.username(),
            &format!("{}/{}", directory.relative(), name),
        )?;

        let upload = {
            let sandbox = sandbox.clone();
            tokio::task::spawn_blocking(move || sandbox.begin_upload(&target)).await??
        };
        let upload = stream_field(field, upload).await?;

        tracing::info!(
            "Upload of {} bytes committed for {}",
            upload.written(),
            current.username()
        );
        let info = tokio::task::spawn_blocking(move || upload.commit()).await??;
        return Ok(success_with(info));
    }

    Err(AppError::invalid("field 'file' must be a file"))
}

/// Copy a multipart field into a staged upload chunk by chunk
///
/// An error drops the upload, which discards the partial file.
async fn stream_field(mut field: Field<'_>, mut upload: Upload) -> Result<Upload> {
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        upload = tokio::task::spawn_blocking(move || {
            upload.write_chunk(&chunk)?;
            Ok::<_, AppError>(upload)
        })
        .await??;
    }
    Ok(upload)
}

fn multipart_error(error: MultipartError) -> AppError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge;
    }
    tracing::warn!("Failed to parse multipart body: {}", error.body_text());
    AppError::invalid("failed to parse form")
}

/// Rename (`{"filename"}`) or move (`{"path"}`) an entry
///
/// Shares on the old location are dropped.
pub async fn update_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    path: Option<Path<String>>,
    JsonBody(payload): JsonBody<RelocateRequest>,
) -> ApiResponse<Relocated> {
    let filename = payload.filename.filter(|s| !s.is_empty());
    let new_parent = payload.path.filter(|s| !s.is_empty());

    let relocation = match (filename, new_parent) {
        (Some(_), Some(_)) => {
            return Err(AppError::invalid(
                "cannot change path and filename at the same time",
            ))
        }
        (Some(filename), None) => Relocation::Rename(filename),
        (None, Some(new_parent)) => Relocation::Move(new_parent),
        (None, None) => {
            return Err(AppError::invalid(
                "one of fields 'filename' and 'path' is required",
            ))
        }
    };

    let sandbox = state.sandbox.clone();
    let shares = state.shares.clone();
    let virtual_path = virtual_path(path);

    let destination = tokio::task::spawn_blocking(move || {
        let source = sandbox.resolve(current.username(), &virtual_path)?;
        let destination = sandbox.relocate(&source, &relocation)?;
        if destination != source {
            shares.forget_path(&source)?;
        }
        Ok::<_, AppError>(destination)
    })
    .await??;

    Ok(success_with(Relocated {
        path: format!("/{}", destination.relative()),
    }))
}

/// Delete a file, or a directory with everything beneath it
pub async fn delete_entry(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    path: Option<Path<String>>,
) -> ApiResponse<()> {
    let sandbox = state.sandbox.clone();
    let shares = state.shares.clone();
    let virtual_path = virtual_path(path);

    tokio::task::spawn_blocking(move || {
        let path = sandbox.resolve(current.username(), &virtual_path)?;
        sandbox.delete(&path)?;
        shares.forget_path(&path)?;
        Ok::<_, AppError>(())
    })
    .await??;

    Ok(success())
}
