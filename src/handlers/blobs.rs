use axum::{
    body::Body,
    extract::Path,
    http::{header, StatusCode},
    response::Response,
    Extension,
};

use crate::backend::BlobContent;
use crate::error::{AppError, Result};
use crate::middleware::session::Clients;
use crate::models::UserRecord;
use crate::services::FileService;

/// Serve a blob inline
/// GET /api/v1/blobs/:id/view
pub async fn view_blob(
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
) -> Result<Response> {
    FileService::get_visible_file_by_blob(&clients.admin, &user, &id).await?;
    let blob = clients.admin.storage.get_file(&id).await?;
    blob_response(blob, "inline")
}

/// Serve a blob as an attachment
/// GET /api/v1/blobs/:id/download
pub async fn download_blob(
    clients: Clients,
    Extension(user): Extension<UserRecord>,
    Path(id): Path<String>,
) -> Result<Response> {
    FileService::get_visible_file_by_blob(&clients.admin, &user, &id).await?;
    let blob = clients.admin.storage.get_file(&id).await?;
    blob_response(blob, "attachment")
}

fn blob_response(blob: BlobContent, disposition: &str) -> Result<Response> {
    let content_type = mime_guess::from_path(&blob.name)
        .first_or_octet_stream()
        .to_string();

    let fallback_name = blob.name.replace(['"', '\\'], "_");
    let encoded_name = urlencoding::encode(&blob.name);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, blob.data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "{}; filename=\"{}\"; filename*=UTF-8''{}",
                disposition, fallback_name, encoded_name
            ),
        )
        .body(Body::from(blob.data))
        .map_err(|e| AppError::Internal(format!("Failed to build response: {}", e)))
}
