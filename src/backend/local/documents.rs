use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::backend::query::apply;
use crate::backend::{now_timestamp, Document, DocumentList, DocumentStore, Query};
use crate::db::Database;
use crate::error::{AppError, Result};

/// Document collections stored as JSON rows
pub struct LocalDocuments {
    db: Database,
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let data: Map<String, Value> = serde_json::from_str(&self.data)?;
        Ok(Document {
            id: self.id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            data,
        })
    }
}

impl LocalDocuments {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn into_object(data: Value) -> Result<Map<String, Value>> {
        match data {
            Value::Object(map) => Ok(map
                .into_iter()
                .filter(|(k, _)| !k.starts_with('$'))
                .collect()),
            _ => Err(AppError::BadRequest("Document data must be an object".to_string())),
        }
    }
}

#[async_trait]
impl DocumentStore for LocalDocuments {
    async fn create_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        let data = Self::into_object(data)?;
        let now = now_timestamp();

        let result = sqlx::query(
            r#"
            INSERT INTO documents (collection_id, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(collection)
        .bind(document_id)
        .bind(Value::Object(data.clone()).to_string())
        .bind(&now)
        .bind(&now)
        .execute(self.db.pool())
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                return Err(AppError::Conflict(format!(
                    "Document {} already exists in {}",
                    document_id, collection
                )));
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Document {
            id: document_id.to_string(),
            created_at: now.clone(),
            updated_at: now,
            data,
        })
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Document> {
        let row: DocumentRow = sqlx::query_as(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection_id = ? AND id = ?",
        )
        .bind(collection)
        .bind(document_id)
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        row.into_document()
    }

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        let rows: Vec<DocumentRow> = sqlx::query_as(
            "SELECT id, data, created_at, updated_at FROM documents WHERE collection_id = ?",
        )
        .bind(collection)
        .fetch_all(self.db.pool())
        .await?;

        let documents = rows
            .into_iter()
            .map(DocumentRow::into_document)
            .collect::<Result<Vec<_>>>()?;

        let (total, documents) = apply(documents, queries);
        Ok(DocumentList { total, documents })
    }

    async fn update_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        let patch = Self::into_object(data)?;
        let mut doc = self.get_document(collection, document_id).await?;
        doc.data.extend(patch);
        doc.updated_at = now_timestamp();

        sqlx::query("UPDATE documents SET data = ?, updated_at = ? WHERE collection_id = ? AND id = ?")
            .bind(Value::Object(doc.data.clone()).to_string())
            .bind(&doc.updated_at)
            .bind(collection)
            .bind(document_id)
            .execute(self.db.pool())
            .await?;

        Ok(doc)
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection_id = ? AND id = ?")
            .bind(collection)
            .bind(document_id)
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Document not found".to_string()));
        }
        Ok(())
    }
}
