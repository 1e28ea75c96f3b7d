use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;

use super::client::{AppwriteClient, Credentials};
use crate::backend::{BlobContent, BlobStore, StoredBlob};
use crate::error::{AppError, Result};

/// One hosted storage bucket
pub struct AppwriteStorage {
    client: AppwriteClient,
    bucket_id: String,
}

#[derive(Debug, Deserialize)]
struct FileMeta {
    name: String,
}

impl AppwriteStorage {
    pub fn new(client: AppwriteClient, bucket_id: &str) -> Self {
        Self {
            client,
            bucket_id: bucket_id.to_string(),
        }
    }

    fn files_path(&self) -> String {
        format!("/storage/buckets/{}/files", urlencoding::encode(&self.bucket_id))
    }

    fn file_path(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_path(), urlencoding::encode(file_id))
    }

    /// Public URL of a file endpoint; the project rides in the query string
    /// because browsers fetch these without API headers.
    fn public_url(&self, file_id: &str, action: &str) -> String {
        format!(
            "{}/{}?project={}",
            self.client.url(&self.file_path(file_id)),
            action,
            urlencoding::encode(self.client.project_id())
        )
    }
}

#[async_trait]
impl BlobStore for AppwriteStorage {
    async fn create_file(&self, file_id: &str, name: &str, data: Bytes) -> Result<StoredBlob> {
        let mime = mime_guess::from_path(name).first_or_octet_stream();
        let part = Part::bytes(data.to_vec())
            .file_name(name.to_string())
            .mime_str(mime.as_ref())
            .map_err(|e| AppError::BadRequest(format!("Invalid content type: {}", e)))?;
        let form = Form::new().text("fileId", file_id.to_string()).part("file", part);

        let request = self
            .client
            .request(Method::POST, &self.files_path(), Credentials::Admin)?
            .multipart(form);
        let blob: StoredBlob = AppwriteClient::send_json(request).await?;

        tracing::info!("Uploaded blob {} ({} bytes)", blob.id, blob.size_original);
        Ok(blob)
    }

    async fn get_file(&self, file_id: &str) -> Result<BlobContent> {
        let meta_request = self
            .client
            .request(Method::GET, &self.file_path(file_id), Credentials::Admin)?;
        let meta: FileMeta = AppwriteClient::send_json(meta_request).await?;

        let data_request = self.client.request(
            Method::GET,
            &format!("{}/download", self.file_path(file_id)),
            Credentials::Admin,
        )?;
        let data = AppwriteClient::send_bytes(data_request).await?;

        Ok(BlobContent {
            name: meta.name,
            data,
        })
    }

    async fn delete_file(&self, file_id: &str) -> Result<()> {
        let request = self
            .client
            .request(Method::DELETE, &self.file_path(file_id), Credentials::Admin)?;
        AppwriteClient::send_empty(request).await?;
        tracing::debug!("Deleted blob {}", file_id);
        Ok(())
    }

    fn view_url(&self, file_id: &str) -> String {
        self.public_url(file_id, "view")
    }

    fn download_url(&self, file_id: &str) -> String {
        self.public_url(file_id, "download")
    }

    fn storage_type(&self) -> &'static str {
        "appwrite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_urls() {
        let client = AppwriteClient::new("https://cloud.appwrite.io/v1", "proj", "key").unwrap();
        let storage = AppwriteStorage::new(client, "bucket");

        assert_eq!(
            storage.view_url("f1"),
            "https://cloud.appwrite.io/v1/storage/buckets/bucket/files/f1/view?project=proj"
        );
        assert_eq!(
            storage.download_url("f1"),
            "https://cloud.appwrite.io/v1/storage/buckets/bucket/files/f1/download?project=proj"
        );
    }
}
