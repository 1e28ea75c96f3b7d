use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Result;

use super::{Document, DocumentList, Query};

/// Document collections of the backend service
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document>;

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Document>;

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList>;

    /// Merge `data` into the stored attributes
    async fn update_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document>;

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<()>;
}

/// Object storage bucket
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn create_file(&self, file_id: &str, name: &str, data: Bytes) -> Result<StoredBlob>;

    async fn get_file(&self, file_id: &str) -> Result<BlobContent>;

    async fn delete_file(&self, file_id: &str) -> Result<()>;

    /// URL rendering the blob inline
    fn view_url(&self, file_id: &str) -> String;

    /// URL serving the blob as an attachment
    fn download_url(&self, file_id: &str) -> String;

    fn storage_type(&self) -> &'static str;
}

/// Email-OTP authentication of the backend service
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Email a one-time code; `user_id` is used when the email has no account yet
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken>;

    /// Exchange a one-time code for a session
    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session>;

    async fn get_account(&self, session_secret: &str) -> Result<Account>;

    async fn delete_session(&self, session_secret: &str) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoredBlob {
    #[serde(rename = "$id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "sizeOriginal")]
    pub size_original: i64,
}

#[derive(Debug, Clone)]
pub struct BlobContent {
    pub name: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailToken {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    #[serde(rename = "$id")]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: String,
}
