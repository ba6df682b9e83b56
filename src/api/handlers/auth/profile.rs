//! Authenticated profile update endpoint.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::AuthError;
use super::principal::require_auth;
use super::state::AuthState;
use super::storage::update_profile;
use super::types::{envelope, ProfileResponse, UserInfoRequest};

#[utoipa::path(
    put,
    path = "/auth/user-info",
    request_body = UserInfoRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 401, description = "Missing or invalid bearer token", body = String)
    ),
    security(("bearer" = [])),
    tag = "auth"
)]
pub async fn save_user_info(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<UserInfoRequest>>,
) -> impl IntoResponse {
    let request: UserInfoRequest = match payload {
        Some(Json(payload)) => payload,
        None => return AuthError::Validation("Missing payload".to_string()).into_response(),
    };

    match apply_update(&headers, &pool, &auth_state, &request).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

async fn apply_update(
    headers: &HeaderMap,
    pool: &PgPool,
    auth_state: &AuthState,
    request: &UserInfoRequest,
) -> Result<Response, AuthError> {
    let principal = require_auth(headers, pool, auth_state).await?;

    // Empty strings are treated as "not provided", matching the partial
    // update semantics of the profile screen.
    let full_name = request
        .user_name
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());
    let phone_number = request
        .phone_number
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let updated = update_profile(pool, principal.user_id, full_name, phone_number)
        .await?
        .ok_or_else(|| AuthError::NotFound("User not found".to_string()))?;

    Ok(envelope(
        StatusCode::OK,
        "User information saved successfully",
        Some(ProfileResponse {
            email: updated.email,
            full_name: updated.full_name,
            phone_number: updated.phone_number,
        }),
    ))
}
