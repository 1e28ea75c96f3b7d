use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use bytes::BytesMut;

use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::session::Clients;
use crate::models::{
    DeleteFileQuery, FileActionOutcome, FileActionRequest, FileList, FileListQuery, FileRecord,
    FileType, GetFilesParams, IncomingFile, RenameFileRequest, TotalSpace, UpdateFileUsersRequest,
    UploadBatchResult, UserRecord,
};
use crate::services::FileService;
use crate::AppState;

/// List files visible to the caller
/// GET /api/v1/files?type=media&query=trip&sort=name-asc&limit=10
pub async fn list_files(
    clients: Clients,
    Query(query): Query<FileListQuery>,
) -> Result<Json<ApiResponse<FileList>>> {
    let params = GetFilesParams {
        types: query
            .file_type
            .as_deref()
            .map(FileType::for_route)
            .unwrap_or_default(),
        search_text: query.query.unwrap_or_default(),
        sort_text: query.sort.unwrap_or_default(),
        limit: query.limit,
    };

    let files = FileService::get_files(&clients.admin, clients.session(), params).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// A multipart read error. Hitting the request body limit is reported as 413.
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Upload request is too large: {}", e.body_text()))
    } else {
        AppError::BadRequest(format!("{}: {}", context, e.body_text()))
    }
}

/// Upload one or more files
/// POST /api/v1/files/upload
pub async fn upload_files(
    State(state): State<AppState>,
    clients: Clients,
    Extension(owner): Extension<UserRecord>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadBatchResult>>> {
    let max_file_size = state.config.upload.max_file_size;
    let mut files = Vec::new();
    let mut path = "/".to_string();

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to process multipart", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let file_name = field
                    .file_name()
                    .map(|s| s.to_string())
                    .ok_or_else(|| AppError::BadRequest("No file name provided".to_string()))?;

                // Oversized bodies are drained but not kept
                let mut size: u64 = 0;
                let mut data = BytesMut::new();
                while let Some(chunk) = field
                    .chunk()
                    .await
                    .map_err(|e| multipart_error("Failed to read file chunk", e))?
                {
                    size += chunk.len() as u64;
                    if size <= max_file_size {
                        data.extend_from_slice(&chunk);
                    } else if !data.is_empty() {
                        data = BytesMut::new();
                    }
                }

                files.push(IncomingFile {
                    name: file_name,
                    size,
                    data: data.freeze(),
                });
            }
            "path" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read path", e))?;
                if !text.is_empty() {
                    path = text;
                }
            }
            _ => {}
        }
    }

    if files.is_empty() {
        return Err(AppError::BadRequest("No file provided".to_string()));
    }

    let result = FileService::upload_batch(
        &clients.admin,
        &state.revalidator,
        files,
        &owner,
        &path,
        max_file_size,
    )
    .await;

    for notice in &result.rejected {
        tracing::info!("Rejected upload: {}", notice.message);
    }

    Ok(Json(ApiResponse::success(result)))
}

/// Storage usage per file type
/// GET /api/v1/files/usage
pub async fn usage(clients: Clients) -> Result<Json<ApiResponse<TotalSpace>>> {
    let total = FileService::get_total_space_used(&clients.admin, clients.session()).await?;
    Ok(Json(ApiResponse::success(total)))
}

/// Rename a file
/// PATCH /api/v1/files/:id
pub async fn rename_file(
    State(state): State<AppState>,
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
    Json(req): Json<RenameFileRequest>,
) -> Result<Json<ApiResponse<FileRecord>>> {
    let file = FileService::rename_file(
        &clients.admin,
        &state.revalidator,
        &user,
        &id,
        &req.name,
        &req.extension,
        &req.path,
    )
    .await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Replace the list of emails a file is shared with
/// PUT /api/v1/files/:id/users
pub async fn update_file_users(
    State(state): State<AppState>,
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
    Json(req): Json<UpdateFileUsersRequest>,
) -> Result<Json<ApiResponse<FileRecord>>> {
    let file = FileService::update_file_users(
        &clients.admin,
        &state.revalidator,
        &user,
        &id,
        req.emails,
        &req.path,
    )
    .await?;
    Ok(Json(ApiResponse::success(file)))
}

/// Delete a file and its blob
/// DELETE /api/v1/files/:id?bucketFileId=xxx&path=/
pub async fn delete_file(
    State(state): State<AppState>,
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
    Query(query): Query<DeleteFileQuery>,
) -> Result<Json<ApiResponse<()>>> {
    FileService::delete_file(
        &clients.admin,
        &state.revalidator,
        &user,
        &id,
        &query.bucket_file_id,
        &query.path,
    )
    .await?;
    Ok(Json(ApiResponse::<()>::success_message("File deleted")))
}

/// Run a file action from the actions menu
/// POST /api/v1/files/:id/actions
pub async fn file_action(
    State(state): State<AppState>,
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
    Json(req): Json<FileActionRequest>,
) -> Result<Json<ApiResponse<FileActionOutcome>>> {
    let outcome =
        FileService::dispatch(&clients.admin, &state.revalidator, &user, &id, req.action, &req.path)
            .await?;
    Ok(Json(ApiResponse::success(outcome)))
}
