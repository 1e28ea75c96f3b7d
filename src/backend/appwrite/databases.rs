use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};

use super::client::{AppwriteClient, Credentials};
use crate::backend::{Document, DocumentList, DocumentStore, Query};
use crate::error::Result;

/// Collections of one hosted database
pub struct AppwriteDatabases {
    client: AppwriteClient,
    database_id: String,
}

impl AppwriteDatabases {
    pub fn new(client: AppwriteClient, database_id: &str) -> Self {
        Self {
            client,
            database_id: database_id.to_string(),
        }
    }

    fn documents_path(&self, collection: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            urlencoding::encode(&self.database_id),
            urlencoding::encode(collection)
        )
    }

    fn document_path(&self, collection: &str, document_id: &str) -> String {
        format!(
            "{}/{}",
            self.documents_path(collection),
            urlencoding::encode(document_id)
        )
    }

    /// `queries[]` parameters, one JSON-encoded query each
    fn query_params(queries: &[Query]) -> Vec<(&'static str, String)> {
        queries
            .iter()
            .map(|q| ("queries[]", q.to_wire().to_string()))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for AppwriteDatabases {
    async fn create_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        let request = self
            .client
            .request(Method::POST, &self.documents_path(collection), Credentials::Admin)?
            .json(&json!({ "documentId": document_id, "data": data }));
        AppwriteClient::send_json(request).await
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Document> {
        let request = self.client.request(
            Method::GET,
            &self.document_path(collection, document_id),
            Credentials::Admin,
        )?;
        AppwriteClient::send_json(request).await
    }

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        let request = self
            .client
            .request(Method::GET, &self.documents_path(collection), Credentials::Admin)?
            .query(&Self::query_params(queries));
        AppwriteClient::send_json(request).await
    }

    async fn update_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        let request = self
            .client
            .request(
                Method::PATCH,
                &self.document_path(collection, document_id),
                Credentials::Admin,
            )?
            .json(&json!({ "data": data }));
        AppwriteClient::send_json(request).await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<()> {
        let request = self.client.request(
            Method::DELETE,
            &self.document_path(collection, document_id),
            Credentials::Admin,
        )?;
        AppwriteClient::send_empty(request).await
    }
}
