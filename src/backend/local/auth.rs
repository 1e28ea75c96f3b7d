use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::{distributions::Alphanumeric, Rng};
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::Mutex;

use super::hash_secret;
use crate::backend::{now_timestamp, unique_id, Account, AuthProvider, EmailToken, Session};
use crate::db::Database;
use crate::error::{AppError, Result};

const EMAIL_TOKEN_TTL_MINUTES: i64 = 15;
const SESSION_TTL_DAYS: i64 = 365;

/// Email-OTP accounts and sessions kept in SQLite.
/// Codes are logged instead of being mailed; test builds also keep them
/// in an outbox so fixtures can read them back.
pub struct LocalAuth {
    db: Database,
    #[cfg(test)]
    outbox: Mutex<HashMap<String, Vec<String>>>,
}

impl LocalAuth {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            #[cfg(test)]
            outbox: Mutex::new(HashMap::new()),
        }
    }

    /// Codes issued to an email, oldest first
    #[cfg(test)]
    pub fn sent_codes(&self, email: &str) -> Vec<String> {
        self.outbox
            .lock()
            .map(|outbox| outbox.get(email).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    #[cfg(test)]
    fn record_code(&self, email: &str, code: &str) {
        if let Ok(mut outbox) = self.outbox.lock() {
            outbox.entry(email.to_string()).or_default().push(code.to_string());
        }
    }

    fn generate_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }

    fn generate_session_secret() -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect()
    }

    fn is_expired(expires_at: &str) -> bool {
        match DateTime::parse_from_rfc3339(expires_at) {
            Ok(t) => t < Utc::now(),
            Err(_) => true,
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuth {
    async fn create_email_token(&self, user_id: &str, email: &str) -> Result<EmailToken> {
        let code = Self::generate_code();
        let now = now_timestamp();

        // Concurrent sign-ups for one email settle on the first account
        sqlx::query(
            "INSERT INTO accounts (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT(email) DO NOTHING",
        )
        .bind(user_id)
        .bind(email)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        let (account_id,): (String,) = sqlx::query_as("SELECT id FROM accounts WHERE email = ?")
            .bind(email)
            .fetch_one(self.db.pool())
            .await?;

        let token_id = unique_id();
        let expires_at = (Utc::now() + Duration::minutes(EMAIL_TOKEN_TTL_MINUTES)).to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO email_tokens (id, account_id, secret_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&token_id)
        .bind(&account_id)
        .bind(hash_secret(&code))
        .bind(&expires_at)
        .bind(&now)
        .execute(self.db.pool())
        .await?;

        tracing::info!("One-time code for {}: {}", email, code);
        #[cfg(test)]
        self.record_code(email, &code);

        Ok(EmailToken {
            id: token_id,
            user_id: account_id,
        })
    }

    async fn create_session(&self, user_id: &str, secret: &str) -> Result<Session> {
        let mut tx = self.db.pool().begin().await?;

        let token: (String, String) = sqlx::query_as(
            "SELECT id, expires_at FROM email_tokens WHERE account_id = ? AND secret_hash = ?",
        )
        .bind(user_id)
        .bind(hash_secret(secret))
        .fetch_optional(tx.as_mut())
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid token".to_string()))?;

        if Self::is_expired(&token.1) {
            sqlx::query("DELETE FROM email_tokens WHERE id = ?")
                .bind(&token.0)
                .execute(tx.as_mut())
                .await?;
            tx.commit().await?;
            return Err(AppError::Unauthenticated("Token expired".to_string()));
        }

        // A verified code consumes every outstanding code for the account
        sqlx::query("DELETE FROM email_tokens WHERE account_id = ?")
            .bind(user_id)
            .execute(tx.as_mut())
            .await?;

        let session_id = unique_id();
        let session_secret = Self::generate_session_secret();
        let expires_at = (Utc::now() + Duration::days(SESSION_TTL_DAYS)).to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO sessions (id, account_id, secret_hash, expires_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&session_id)
        .bind(user_id)
        .bind(hash_secret(&session_secret))
        .bind(&expires_at)
        .bind(now_timestamp())
        .execute(tx.as_mut())
        .await?;

        tx.commit().await?;

        Ok(Session {
            id: session_id,
            user_id: user_id.to_string(),
            secret: session_secret,
        })
    }

    async fn get_account(&self, session_secret: &str) -> Result<Account> {
        let row: (String, String, String, String) = sqlx::query_as(
            r#"
            SELECT a.id, a.email, a.name, s.expires_at
            FROM sessions s
            JOIN accounts a ON s.account_id = a.id
            WHERE s.secret_hash = ?
            "#,
        )
        .bind(hash_secret(session_secret))
        .fetch_optional(self.db.pool())
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid session".to_string()))?;

        if Self::is_expired(&row.3) {
            return Err(AppError::Unauthenticated("Session expired".to_string()));
        }

        Ok(Account {
            id: row.0,
            email: row.1,
            name: row.2,
        })
    }

    async fn delete_session(&self, session_secret: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE secret_hash = ?")
            .bind(hash_secret(session_secret))
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Unauthenticated("Invalid session".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup() -> LocalAuth {
        LocalAuth::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_email_token_reuses_account() {
        let auth = setup().await;
        let first = auth.create_email_token("acc1", "a@example.com").await.unwrap();
        let second = auth.create_email_token("acc2", "a@example.com").await.unwrap();

        assert_eq!(first.user_id, "acc1");
        assert_eq!(second.user_id, "acc1");
        assert_ne!(first.id, second.id);
        assert_eq!(auth.sent_codes("a@example.com").len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_tokens_share_account() {
        let auth = setup().await;
        let (first, second) = tokio::join!(
            auth.create_email_token("acc1", "a@example.com"),
            auth.create_email_token("acc2", "a@example.com"),
        );

        let first = first.unwrap();
        let second = second.unwrap();
        assert_eq!(first.user_id, second.user_id);

        let (accounts,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE email = ?")
            .bind("a@example.com")
            .fetch_one(auth.db.pool())
            .await
            .unwrap();
        assert_eq!(accounts, 1);
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let auth = setup().await;
        let token = auth.create_email_token("acc1", "a@example.com").await.unwrap();
        let code = auth.sent_codes("a@example.com").pop().unwrap();

        let session = auth.create_session(&token.user_id, &code).await.unwrap();
        assert_eq!(session.user_id, "acc1");

        let account = auth.get_account(&session.secret).await.unwrap();
        assert_eq!(account.id, "acc1");
        assert_eq!(account.email, "a@example.com");

        auth.delete_session(&session.secret).await.unwrap();
        assert!(matches!(
            auth.get_account(&session.secret).await,
            Err(AppError::Unauthenticated(_))
        ));
    }

    #[tokio::test]
    async fn test_code_is_single_use() {
        let auth = setup().await;
        let token = auth.create_email_token("acc1", "a@example.com").await.unwrap();
        let code = auth.sent_codes("a@example.com").pop().unwrap();

        auth.create_session(&token.user_id, &code).await.unwrap();
        assert!(auth.create_session(&token.user_id, &code).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_code_rejected() {
        let auth = setup().await;
        let token = auth.create_email_token("acc1", "a@example.com").await.unwrap();
        let code = auth.sent_codes("a@example.com").pop().unwrap();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = auth.create_session(&token.user_id, wrong).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated(_)));
    }
}
