use axum::Json;

use crate::error::{ApiResponse, Result};
use crate::middleware::session::Clients;
use crate::models::UserRecord;
use crate::services::UserService;

/// Current user, or `null` without a valid session
/// GET /api/v1/user/me
pub async fn me(clients: Clients) -> Result<Json<ApiResponse<Option<UserRecord>>>> {
    let user = UserService::get_current_user(&clients.admin, clients.session()).await;
    Ok(Json(ApiResponse::success(user)))
}
