//! REST client for the hosted backend service.
//! Admin calls carry the project API key; session calls carry only the
//! caller's session secret.

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AppError, Result};

const PROJECT_HEADER: HeaderName = HeaderName::from_static("x-appwrite-project");
const KEY_HEADER: HeaderName = HeaderName::from_static("x-appwrite-key");
const SESSION_HEADER: HeaderName = HeaderName::from_static("x-appwrite-session");

/// Credentials attached to a request
#[derive(Debug, Clone, Copy)]
pub enum Credentials<'a> {
    Admin,
    Session(&'a str),
}

#[derive(Debug, Clone)]
pub struct AppwriteClient {
    endpoint: String,
    project_id: String,
    project_header: HeaderValue,
    key_header: HeaderValue,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl AppwriteClient {
    pub fn new(endpoint: &str, project_id: &str, api_key: &str) -> Result<Self> {
        let project_header = HeaderValue::from_str(project_id)
            .map_err(|_| AppError::BadRequest("Invalid project id".to_string()))?;
        let mut key_header = HeaderValue::from_str(api_key)
            .map_err(|_| AppError::BadRequest("Invalid API key".to_string()))?;
        key_header.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            project_header,
            key_header,
            http,
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Full URL for an API path such as `/account`
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    fn headers(&self, credentials: Credentials<'_>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(PROJECT_HEADER, self.project_header.clone());
        match credentials {
            Credentials::Admin => {
                headers.insert(KEY_HEADER, self.key_header.clone());
            }
            Credentials::Session(secret) => {
                let mut value = HeaderValue::from_str(secret)
                    .map_err(|_| AppError::Unauthenticated("Invalid session".to_string()))?;
                value.set_sensitive(true);
                headers.insert(SESSION_HEADER, value);
            }
        }
        Ok(headers)
    }

    pub fn request(&self, method: Method, path: &str, credentials: Credentials<'_>) -> Result<RequestBuilder> {
        Ok(self
            .http
            .request(method, self.url(path))
            .headers(self.headers(credentials)?))
    }

    async fn send(request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(upstream_error(status.as_u16(), &body))
    }

    pub async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = Self::send(request).await?;
        Ok(response.json::<T>().await?)
    }

    pub async fn send_empty(request: RequestBuilder) -> Result<()> {
        Self::send(request).await?;
        Ok(())
    }

    pub async fn send_bytes(request: RequestBuilder) -> Result<Bytes> {
        let response = Self::send(request).await?;
        Ok(response.bytes().await?)
    }
}

/// Map a failed response to an error, keeping the service's own message
fn upstream_error(status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| {
            if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                body.chars().take(200).collect()
            }
        });

    AppError::Upstream { status, message }
}
