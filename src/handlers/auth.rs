use axum::{
    extract::State,
    response::{IntoResponse, Redirect},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::backend::SESSION_COOKIE;
use crate::error::{ApiResponse, Result};
use crate::middleware::session::Clients;
use crate::models::{
    AccountIdResponse, CreateAccountRequest, SendOtpRequest, SessionIdResponse, SignInRequest,
    VerifySecretRequest,
};
use crate::services::UserService;
use crate::AppState;

/// Sign up and email a one-time code
/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    clients: Clients,
    Json(req): Json<CreateAccountRequest>,
) -> Result<Json<ApiResponse<AccountIdResponse>>> {
    let account_id = UserService::create_account(&clients.admin, req).await?;
    Ok(Json(ApiResponse::success(AccountIdResponse { account_id })))
}

/// Email a one-time code to an existing user
/// POST /api/v1/auth/sign-in
pub async fn sign_in(
    clients: Clients,
    Json(req): Json<SignInRequest>,
) -> Result<Json<ApiResponse<AccountIdResponse>>> {
    let account_id = UserService::sign_in_user(&clients.admin, &req.email).await?;
    Ok(Json(ApiResponse::success(AccountIdResponse { account_id })))
}

/// Resend a one-time code
/// POST /api/v1/auth/otp
pub async fn send_otp(
    clients: Clients,
    Json(req): Json<SendOtpRequest>,
) -> Result<Json<ApiResponse<AccountIdResponse>>> {
    let account_id = UserService::send_email_otp(&clients.admin, &req.email).await?;
    Ok(Json(ApiResponse::success(AccountIdResponse { account_id })))
}

/// Verify a one-time code and start a session
/// POST /api/v1/auth/verify
pub async fn verify(
    State(state): State<AppState>,
    clients: Clients,
    jar: CookieJar,
    Json(req): Json<VerifySecretRequest>,
) -> Result<impl IntoResponse> {
    let session = UserService::verify_secret(&clients.admin, &req.account_id, &req.password).await?;

    let cookie = Cookie::build((SESSION_COOKIE, session.secret))
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.session.cookie_secure)
        .path("/")
        .build();

    Ok((
        jar.add(cookie),
        Json(ApiResponse::success(SessionIdResponse {
            session_id: session.id,
        })),
    ))
}

/// Sign out. Always clears the cookie and redirects, even when the
/// remote session could not be deleted.
/// POST /api/v1/auth/sign-out
pub async fn sign_out(clients: Clients, jar: CookieJar) -> impl IntoResponse {
    UserService::sign_out_user(clients.session()).await;

    let remove = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(remove), Redirect::to("/sign-in"))
}
