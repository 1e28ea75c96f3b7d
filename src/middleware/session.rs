use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use std::convert::Infallible;

use crate::backend::{AdminClient, SessionClient};
use crate::error::AppError;
use crate::services::UserService;
use crate::AppState;

/// Backend clients for the current request: the admin client plus a
/// session client when the caller sent a session cookie
pub struct Clients {
    pub admin: AdminClient,
    pub session: Option<SessionClient>,
}

impl Clients {
    pub fn session(&self) -> Option<&SessionClient> {
        self.session.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Clients {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        Ok(Self {
            admin: state.backend.admin_client(),
            session: state.backend.session_client(&jar),
        })
    }
}

/// Session middleware
/// Resolves the caller to a user record before any handler runs and
/// stores it in the request extensions. A session that does not resolve
/// to a user is rejected here.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let session = state
        .backend
        .session_client(&jar)
        .ok_or_else(|| AppError::Unauthenticated("Missing session".to_string()))?;

    let user =
        UserService::require_current_user(&state.backend.admin_client(), Some(&session)).await?;
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
