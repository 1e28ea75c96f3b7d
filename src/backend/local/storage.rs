use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::backend::{BlobContent, BlobStore, StoredBlob};
use crate::error::{AppError, Result};

/// Local file system blob storage.
/// Each blob lives at `{base}/{file_id}/{name}`.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    fn blob_dir(&self, file_id: &str) -> Result<PathBuf> {
        if file_id.is_empty() || file_id.contains(['/', '\\']) || file_id.starts_with('.') {
            return Err(AppError::BadRequest("Invalid file id".to_string()));
        }
        Ok(self.base_path.join(file_id))
    }

    fn sanitize_name(name: &str) -> String {
        Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .filter(|n| !n.is_empty() && *n != "..")
            .unwrap_or("blob")
            .to_string()
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn create_file(&self, file_id: &str, name: &str, data: Bytes) -> Result<StoredBlob> {
        let dir = self.blob_dir(file_id)?;
        if dir.exists() {
            return Err(AppError::Conflict(format!("Blob {} already exists", file_id)));
        }
        fs::create_dir_all(&dir).await?;

        let name = Self::sanitize_name(name);
        let full_path = dir.join(&name);
        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved blob to {:?}", full_path);
        Ok(StoredBlob {
            id: file_id.to_string(),
            name,
            size_original: data.len() as i64,
        })
    }

    async fn get_file(&self, file_id: &str) -> Result<BlobContent> {
        let dir = self.blob_dir(file_id)?;

        let mut entries = fs::read_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                AppError::NotFound(format!("Blob not found: {}", file_id))
            } else {
                AppError::Storage(format!("Failed to read blob: {}", e))
            }
        })?;

        let entry = entries
            .next_entry()
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Blob not found: {}", file_id)))?;
        let name = entry.file_name().to_string_lossy().to_string();
        let data = fs::read(entry.path()).await?;

        Ok(BlobContent {
            name,
            data: Bytes::from(data),
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let dir = self.blob_dir(file_id)?;
        if !dir.exists() {
            return Err(AppError::NotFound(format!("Blob not found: {}", file_id)));
        }

        fs::remove_dir_all(&dir).await?;
        tracing::debug!("Deleted blob {:?}", dir);
        Ok(())
    }

    fn view_url(&self, file_id: &str) -> String {
        format!("/api/v1/blobs/{}/view", urlencoding::encode(file_id))
    }

    fn download_url(&self, file_id: &str) -> String {
        format!("/api/v1/blobs/{}/download", urlencoding::encode(file_id))
    }

    fn storage_type(&self) -> &'static str {
        "local"
    }
}
