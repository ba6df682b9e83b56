//! Request/response types for the auth endpoints.
//!
//! Every endpoint answers with the same envelope: `message`, `statusCode`,
//! and an operation-specific `payload` (possibly null).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub message: String,
    pub status_code: u16,
    pub payload: Option<T>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>, payload: Option<T>) -> Self {
        Self {
            message: message.into(),
            status_code: status.as_u16(),
            payload,
        }
    }
}

/// Build an envelope response in one call; handlers use this for every
/// success path, errors go through `AuthError::into_response`.
pub(super) fn envelope<T: Serialize>(
    status: StatusCode,
    message: impl Into<String>,
    payload: Option<T>,
) -> Response {
    (status, Json(ApiResponse::new(status, message, payload))).into_response()
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RequestOtpRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest {
    pub email: String,
    pub new_password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CheckEmailRequest {
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserInfoRequest {
    pub user_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssuedResponse {
    pub email: String,
    pub expires_in_seconds: i64,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedResponse {
    pub email: String,
    pub is_email_verified: bool,
    pub verified_at: DateTime<Utc>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairResponse {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub is_deleted: bool,
    pub created_date: String,
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub email: String,
    pub full_name: String,
    pub phone_number: String,
}
