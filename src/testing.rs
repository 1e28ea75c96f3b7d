//! Shared fixtures for unit and router tests: the local backend over
//! in-memory SQLite and a temporary blob directory.

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

use crate::backend::local::{LocalAuth, LocalDocuments, LocalStorage};
use crate::backend::{
    Backend, BlobContent, BlobStore, Collections, Document, DocumentList, DocumentStore, Query,
    SessionClient, StoredBlob,
};
use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::CreateAccountRequest;
use crate::revalidate::Revalidator;
use crate::services::UserService;
use crate::AppState;

pub struct TestBackend {
    pub backend: Backend,
    pub auth: Arc<LocalAuth>,
    pub revalidator: Revalidator,
    pub storage_dir: TempDir,
}

fn collections() -> Collections {
    Collections {
        users: "users".to_string(),
        files: "files".to_string(),
    }
}

/// Which backend steps a test backend should fail
#[derive(Default)]
struct Faults {
    file_records: bool,
    blob_deletes: bool,
}

async fn build(faults: Faults) -> TestBackend {
    let db = Database::open_in_memory().await.unwrap();
    let storage_dir = tempfile::tempdir().unwrap();
    let auth = Arc::new(LocalAuth::new(db.clone()));
    let documents = LocalDocuments::new(db);
    let blobs = LocalStorage::new(storage_dir.path());

    let databases: Arc<dyn DocumentStore> = if faults.file_records {
        Arc::new(FailingDocuments { inner: documents })
    } else {
        Arc::new(documents)
    };
    let storage: Arc<dyn BlobStore> = if faults.blob_deletes {
        Arc::new(FailingBlobDeletes { inner: blobs })
    } else {
        Arc::new(blobs)
    };

    let backend = Backend::new(databases, storage, auth.clone(), collections());

    TestBackend {
        backend,
        auth,
        revalidator: Revalidator::new(),
        storage_dir,
    }
}

pub async fn test_backend() -> TestBackend {
    build(Faults::default()).await
}

/// Backend whose file records can never be created
pub async fn failing_backend() -> TestBackend {
    build(Faults {
        file_records: true,
        ..Default::default()
    })
    .await
}

/// File records can never be created and blobs never deleted
pub async fn failing_rollback_backend() -> TestBackend {
    build(Faults {
        file_records: true,
        blob_deletes: true,
    })
    .await
}

/// Blobs can be stored but never deleted
pub async fn failing_blob_delete_backend() -> TestBackend {
    build(Faults {
        blob_deletes: true,
        ..Default::default()
    })
    .await
}

/// Sign up and verify, returning the session secret
pub async fn sign_in_secret(t: &TestBackend, name: &str, email: &str) -> String {
    let admin = t.backend.admin_client();
    let account_id = UserService::create_account(
        &admin,
        CreateAccountRequest {
            full_name: name.to_string(),
            email: email.to_string(),
        },
    )
    .await
    .unwrap();
    let code = t.auth.sent_codes(email).pop().unwrap();
    UserService::verify_secret(&admin, &account_id, &code)
        .await
        .unwrap()
        .secret
}

pub async fn sign_in(t: &TestBackend, name: &str, email: &str) -> SessionClient {
    let secret = sign_in_secret(t, name, email).await;
    SessionClient::new(t.auth.clone(), secret)
}

/// Blobs currently on disk
pub fn blob_count(t: &TestBackend) -> usize {
    std::fs::read_dir(t.storage_dir.path())
        .map(|entries| entries.count())
        .unwrap_or(0)
}

/// Router over the test backend
pub fn test_app(t: &TestBackend, max_file_size: u64) -> Router {
    let mut config = Config::default();
    config.upload.max_file_size = max_file_size;
    test_app_with(t, config)
}

pub fn test_app_with(t: &TestBackend, config: Config) -> Router {
    crate::create_router(AppState {
        config: Arc::new(config),
        backend: t.backend.clone(),
        revalidator: t.revalidator.clone(),
    })
}

struct FailingDocuments {
    inner: LocalDocuments,
}

#[async_trait]
impl DocumentStore for FailingDocuments {
    async fn create_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        if collection == "files" {
            return Err(AppError::Internal("document store unavailable".to_string()));
        }
        self.inner.create_document(collection, document_id, data).await
    }

    async fn get_document(&self, collection: &str, document_id: &str) -> Result<Document> {
        self.inner.get_document(collection, document_id).await
    }

    async fn list_documents(&self, collection: &str, queries: &[Query]) -> Result<DocumentList> {
        self.inner.list_documents(collection, queries).await
    }

    async fn update_document(&self, collection: &str, document_id: &str, data: Value) -> Result<Document> {
        self.inner.update_document(collection, document_id, data).await
    }

    async fn delete_document(&self, collection: &str, document_id: &str) -> Result<()> {
        self.inner.delete_document(collection, document_id).await
    }
}

struct FailingBlobDeletes {
    inner: LocalStorage,
}

#[async_trait]
impl BlobStore for FailingBlobDeletes {
    async fn create_file(&self, file_id: &str, name: &str, data: Bytes) -> Result<StoredBlob> {
        self.inner.create_file(file_id, name, data).await
    }

    async fn get_file(&self, file_id: &str) -> Result<BlobContent> {
        self.inner.get_file(file_id).await
    }

    async fn delete_file(&self, _file_id: &str) -> Result<()> {
        Err(AppError::Storage("blob store unavailable".to_string()))
    }

    fn view_url(&self, file_id: &str) -> String {
        self.inner.view_url(file_id)
    }

    fn download_url(&self, file_id: &str) -> String {
        self.inner.download_url(file_id)
    }

    fn storage_type(&self) -> &'static str {
        self.inner.storage_type()
    }
}
