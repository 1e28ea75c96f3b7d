use serde::{Deserialize, Serialize};

/// Avatar assigned to every new user record
pub const AVATAR_PLACEHOLDER_URL: &str =
    "https://th.bing.com/th/id/OIP.UhqrY29sJDhTG2gaOwEBAQHaHa?rs=1&pid=ImgDetMain&cb=idpwebp2&o=7&rm=3";

/// User record in the users collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    #[serde(rename = "$id")]
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub account_id: String,
}

/// Attributes written when a user record is created
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUserDocument {
    pub full_name: String,
    pub email: String,
    pub avatar: String,
    pub account_id: String,
}

/// Sign-up request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAccountRequest {
    pub full_name: String,
    pub email: String,
}

/// Sign-in request
#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
}

/// Resend one-time code
#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    pub email: String,
}

/// One-time code verification
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifySecretRequest {
    pub account_id: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdResponse {
    pub account_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdResponse {
    pub session_id: String,
}
