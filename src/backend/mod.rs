pub mod appwrite;
pub mod local;
pub mod provider;
pub mod query;

pub use provider::*;
pub use query::Query;

use axum_extra::extract::cookie::CookieJar;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::config::{BackendKind, Config};
use crate::db::Database;
use crate::error::Result;

use self::appwrite::{AppwriteAccount, AppwriteClient, AppwriteDatabases, AppwriteStorage};
use self::local::{LocalAuth, LocalDocuments, LocalStorage};

/// Name of the cookie holding the provider session secret
pub const SESSION_COOKIE: &str = "session";

/// A stored document: system attributes plus free-form data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: String,
    #[serde(rename = "$updatedAt")]
    pub updated_at: String,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Document {
    /// Look up an attribute, including the `$`-prefixed system ones
    pub fn attribute(&self, name: &str) -> Option<Value> {
        match name {
            "$id" => Some(Value::String(self.id.clone())),
            "$createdAt" => Some(Value::String(self.created_at.clone())),
            "$updatedAt" => Some(Value::String(self.updated_at.clone())),
            _ => self.data.get(name).cloned(),
        }
    }

    pub fn into_typed<T: DeserializeOwned>(self) -> Result<T> {
        let value = serde_json::to_value(self)?;
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList {
    pub total: u64,
    pub documents: Vec<Document>,
}

impl DocumentList {
    pub fn into_typed<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        self.documents.into_iter().map(Document::into_typed).collect()
    }
}

/// Fresh identifier for documents, blobs and accounts
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Timestamp in the fixed-width format used for `$createdAt`/`$updatedAt`
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Collection identifiers within the configured database
#[derive(Debug, Clone)]
pub struct Collections {
    pub users: String,
    pub files: String,
}

/// Admin-privileged handles onto the backend service
#[derive(Clone)]
pub struct AdminClient {
    pub databases: Arc<dyn DocumentStore>,
    pub storage: Arc<dyn BlobStore>,
    pub account: Arc<dyn AuthProvider>,
    pub collections: Collections,
}

/// Handle bound to one caller's session secret
#[derive(Clone)]
pub struct SessionClient {
    account: Arc<dyn AuthProvider>,
    secret: String,
}

impl SessionClient {
    pub fn new(account: Arc<dyn AuthProvider>, secret: impl Into<String>) -> Self {
        Self {
            account,
            secret: secret.into(),
        }
    }

    /// Account owning this session
    pub async fn get_account(&self) -> Result<Account> {
        self.account.get_account(&self.secret).await
    }

    pub async fn delete_session(&self) -> Result<()> {
        self.account.delete_session(&self.secret).await
    }
}

/// Client factory, constructed once at startup and shared by requests
#[derive(Clone)]
pub struct Backend {
    admin: AdminClient,
}

impl Backend {
    pub fn new(
        databases: Arc<dyn DocumentStore>,
        storage: Arc<dyn BlobStore>,
        account: Arc<dyn AuthProvider>,
        collections: Collections,
    ) -> Self {
        Self {
            admin: AdminClient {
                databases,
                storage,
                account,
                collections,
            },
        }
    }

    /// Build the provider selected by configuration
    pub async fn connect(config: &Config) -> Result<Self> {
        let collections = Collections {
            users: config.appwrite.users_collection_id.clone(),
            files: config.appwrite.files_collection_id.clone(),
        };

        match config.backend.kind {
            BackendKind::Local => {
                let db = Database::new(&config.local.database_path).await?;
                db.run_migrations().await?;
                tracing::info!("Local backend at {}", config.local.database_path);
                Ok(Self::new(
                    Arc::new(LocalDocuments::new(db.clone())),
                    Arc::new(LocalStorage::new(&config.local.storage_path)),
                    Arc::new(LocalAuth::new(db)),
                    collections,
                ))
            }
            BackendKind::Appwrite => {
                let client = AppwriteClient::new(
                    &config.appwrite.endpoint,
                    &config.appwrite.project_id,
                    &config.appwrite.api_key,
                )?;
                tracing::info!("Appwrite backend at {}", config.appwrite.endpoint);
                Ok(Self::new(
                    Arc::new(AppwriteDatabases::new(client.clone(), &config.appwrite.database_id)),
                    Arc::new(AppwriteStorage::new(client.clone(), &config.appwrite.bucket_id)),
                    Arc::new(AppwriteAccount::new(client)),
                    collections,
                ))
            }
        }
    }

    pub fn admin_client(&self) -> AdminClient {
        self.admin.clone()
    }

    /// Session client for the caller's cookie, if one was sent
    pub fn session_client(&self, jar: &CookieJar) -> Option<SessionClient> {
        jar.get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|secret| !secret.is_empty())
            .map(|secret| SessionClient::new(self.admin.account.clone(), secret))
    }
}
