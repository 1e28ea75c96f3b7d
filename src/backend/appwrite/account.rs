use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use super::client::{AppwriteClient, Credentials};
use crate::backend::{Account, AuthProvider, EmailToken, Session};
use crate::error::Result;

/// Email-OTP accounts of the hosted service
pub struct AppwriteAccount {
    client: AppwriteClient,
}

impl AppwriteAccount {
    pub fn new(client: AppwriteClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthProvider for AppwriteAccount {
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken> {
        let request = self
            .client
            .request(Method::POST, "/account/tokens/email", Credentials::Admin)?
            .json(&json!({ "userId": user_id, "email": email }));
        AppwriteClient::send_json(request).await
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session> {
        // With an API key the service returns the session secret in the body
        let request = self
            .client
            .request(Method::POST, "/account/sessions/token", Credentials::Admin)?
            .json(&json!({ "userId": user_id, "secret": secret }));
        AppwriteClient::send_json(request).await
    }

    async fn get_account(&self, session_secret: &str) -> Result<Account> {
        let request = self
            .client
            .request(Method::GET, "/account", Credentials::Session(session_secret))?;
        AppwriteClient::send_json(request).await
    }

    async fn delete_session(&self, session_secret: &str) -> Result<()> {
        let request = self.client.request(
            Method::DELETE,
            "/account/sessions/current",
            Credentials::Session(session_secret),
        )?;
        AppwriteClient::send_empty(request).await
    }
}
