use crate::backend::{unique_id, AdminClient, Query, Session, SessionClient};
use crate::error::{AppError, Result};
use crate::models::{CreateAccountRequest, NewUserDocument, UserRecord, AVATAR_PLACEHOLDER_URL};

/// Account and session actions
pub struct UserService;

impl UserService {
    /// User record registered for an email, if any
    pub async fn get_user_by_email(admin: &AdminClient, email: &str) -> Result<Option<UserRecord>> {
        let result = admin
            .databases
            .list_documents(&admin.collections.users, &[Query::equal("email", [email])])
            .await?;

        Ok(result.into_typed::<UserRecord>()?.into_iter().next())
    }

    /// Email a one-time code and return the account it belongs to
    pub async fn send_email_otp(admin: &AdminClient, email: &str) -> Result<String> {
        let token = admin
            .account
            .create_email_token(&unique_id(), email)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send email OTP to {}: {}", email, e);
                e
            })?;

        Ok(token.user_id)
    }

    /// Sign up. A code is sent on every call; the user record is only
    /// created the first time an email is seen. The record id is the
    /// account id, so racing sign-ups for one email create it once.
    pub async fn create_account(admin: &AdminClient, req: CreateAccountRequest) -> Result<String> {
        let existing = Self::get_user_by_email(admin, &req.email).await?;

        let account_id = Self::send_email_otp(admin, &req.email).await?;
        if account_id.is_empty() {
            return Err(AppError::Upstream {
                status: 502,
                message: "Failed to send an OTP".to_string(),
            });
        }

        if existing.is_none() {
            let doc = NewUserDocument {
                full_name: req.full_name,
                email: req.email,
                avatar: AVATAR_PLACEHOLDER_URL.to_string(),
                account_id: account_id.clone(),
            };
            match admin
                .databases
                .create_document(&admin.collections.users, &account_id, serde_json::to_value(doc)?)
                .await
            {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {
                    tracing::debug!("User record for {} already created", account_id);
                }
                Err(e) => {
                    tracing::error!("Failed to create user record: {}", e);
                    return Err(e);
                }
            }
        }

        Ok(account_id)
    }

    /// Sign in an existing user by emailing them a code
    pub async fn sign_in_user(admin: &AdminClient, email: &str) -> Result<String> {
        let user = Self::get_user_by_email(admin, email)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        Self::send_email_otp(admin, email).await?;
        Ok(user.account_id)
    }

    /// Exchange a one-time code for a session
    pub async fn verify_secret(admin: &AdminClient, account_id: &str, password: &str) -> Result<Session> {
        admin
            .account
            .create_session(account_id, password)
            .await
            .map_err(|e| {
                tracing::error!("Failed to verify OTP for {}: {}", account_id, e);
                e
            })
    }

    /// Resolve the caller's session to their user record.
    /// Any failure along the way yields `None`.
    pub async fn get_current_user(
        admin: &AdminClient,
        session: Option<&SessionClient>,
    ) -> Option<UserRecord> {
        let session = session?;

        let account = match session.get_account().await {
            Ok(account) => account,
            Err(e) => {
                tracing::debug!("No account for session: {}", e);
                return None;
            }
        };

        let result = admin
            .databases
            .list_documents(
                &admin.collections.users,
                &[Query::equal("accountId", [account.id.as_str()])],
            )
            .await
            .and_then(|list| list.into_typed::<UserRecord>());

        match result {
            Ok(users) => users.into_iter().next(),
            Err(e) => {
                tracing::error!("Failed to load user for account {}: {}", account.id, e);
                None
            }
        }
    }

    /// Like `get_current_user`, but a missing user is an error
    pub async fn require_current_user(
        admin: &AdminClient,
        session: Option<&SessionClient>,
    ) -> Result<UserRecord> {
        Self::get_current_user(admin, session)
            .await
            .ok_or_else(|| AppError::Unauthenticated("User is not authenticated".to_string()))
    }

    /// Delete the remote session. Failures are logged only; the caller
    /// clears the cookie and redirects regardless.
    pub async fn sign_out_user(session: Option<&SessionClient>) {
        let Some(session) = session else {
            return;
        };
        if let Err(e) = session.delete_session().await {
            tracing::warn!("Failed to delete session: {}", e);
        }
    }
}
